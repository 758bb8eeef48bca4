use std::time::Duration;

use thiserror::Error;

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Forum
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,

    // Credentials (only required by the binary)
    pub username: Option<String>,
    pub password: Option<String>,

    // Smoke-test thread
    pub forum_id: u64,
    pub thread_subject: String,
    pub thread_message: String,

    // Polling
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Forum
            base_url: normalize_base_url(&env_or_default("FORUM_BASE_URL", DEFAULT_BASE_URL)),
            user_agent: env_or_default("FORUM_USER_AGENT", DEFAULT_USER_AGENT),
            request_timeout: Duration::from_secs(parse_env_u64("FORUM_REQUEST_TIMEOUT_SECS", 30)?),

            // Credentials
            username: optional_env("FORUM_USERNAME"),
            password: optional_env("FORUM_PASSWORD"),

            // Smoke-test thread
            forum_id: parse_env_u64("FORUM_ID", 13)?,
            thread_subject: env_or_default("THREAD_SUBJECT", "API test - confirmation"),
            thread_message: env_or_default(
                "THREAD_MESSAGE",
                "Can anyone confirm that this library works?",
            ),

            // Polling
            poll_interval: Duration::from_secs(parse_env_u64("POLL_INTERVAL_SECS", 30)?),
            poll_timeout: Duration::from_secs(parse_env_u64("POLL_TIMEOUT_SECS", 180)?),
        })
    }

    /// Default settings for the forum at `base_url`.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            username: None,
            password: None,
            forum_id: 13,
            thread_subject: "API test - confirmation".to_string(),
            thread_message: "Can anyone confirm that this library works?".to_string(),
            poll_interval: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(180),
        }
    }

    /// Configuration pointing at `base_url` with short timings, for tests.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            poll_timeout: Duration::from_millis(500),
            ..Self::with_base_url(base_url)
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_BASE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidValue {
                    name: "FORUM_BASE_URL".to_string(),
                    message: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    name: "FORUM_BASE_URL".to_string(),
                    message: e.to_string(),
                });
            }
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "FORUM_REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "POLL_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Credentials for the binary's login step.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing variable.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("FORUM_USERNAME".to_string()))?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("FORUM_PASSWORD".to_string()))?;
        Ok((username, password))
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
