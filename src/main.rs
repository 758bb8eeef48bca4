use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use forum_client::{Config, ForumClient};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    let (username, password) = config
        .credentials()
        .context("Set FORUM_USERNAME and FORUM_PASSWORD to run the smoke test")?;

    info!(base_url = %config.base_url, "Configuration loaded");

    let forum = ForumClient::new(&config).context("Failed to build forum client")?;
    forum
        .login(username, password)
        .await
        .context("Login failed")?;

    let thread_id = forum
        .create_thread(
            config.forum_id,
            &config.thread_subject,
            &config.thread_message,
        )
        .await
        .context("Failed to create thread")?;
    info!(thread_id, "Created thread");

    // Baseline the opening post so only replies are reported
    let mut seen = Vec::new();
    forum
        .poll_once(thread_id, &mut seen)
        .await
        .context("Failed to read the new thread")?;

    info!(
        interval_secs = config.poll_interval.as_secs(),
        timeout_secs = config.poll_timeout.as_secs(),
        "Polling thread for replies"
    );
    let replies = forum
        .poll_thread_since(thread_id, &mut seen, config.poll_interval, config.poll_timeout)
        .await
        .context("Polling failed")?;

    if replies.is_empty() {
        warn!(thread_id, "No replies before timeout");
    }
    println!("{}", serde_json::to_string_pretty(&replies)?);

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,forum_client=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
