//! Session-based client for a MyBB forum.
//!
//! The client scrapes rendered pages: it reads hidden form tokens before every
//! submission and parses thread pages for posts. Session state lives in a
//! cookie jar shared by every request the client makes.

pub mod extract;
mod poller;

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::LOCATION;
use reqwest::{redirect, Client};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::constants::{
    MEMBER_ENDPOINT, NEW_REPLY_ENDPOINT, NEW_THREAD_ENDPOINT, SESSION_COOKIE, SHOW_THREAD_ENDPOINT,
};
use crate::error::{ForumError, Result};

/// Server-assigned thread id (`tid`).
pub type ThreadId = u64;

/// Server-assigned post id (`pid`), the key used to tell new posts from seen ones.
pub type PostId = u64;

/// A single post as rendered on a thread page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub author: String,
    pub content: String,
}

/// Client for one forum host.
///
/// Cloning is cheap and clones share the session. The form flows
/// (login, thread creation, replies) read a token and then post it back, so
/// callers should not run them from several tasks at once on the same session.
#[derive(Debug, Clone)]
pub struct ForumClient {
    base_url: String,
    jar: Arc<Jar>,
    /// Follows redirects; used for page fetches and most submissions.
    client: Client,
    /// Never follows redirects, so login and thread creation see the first response.
    no_redirect: Client,
}

impl ForumClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is malformed or the HTTP client cannot
    /// be built.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        let jar = Arc::new(Jar::default());

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .cookie_provider(jar.clone())
            .redirect(redirect::Policy::limited(10))
            .build()?;

        let no_redirect = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .cookie_provider(jar.clone())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            base_url,
            jar,
            client,
            no_redirect,
        })
    }

    /// Create a client for `base_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is malformed.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(&Config::with_base_url(base_url))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    /// Whether the cookie jar currently holds a MyBB session cookie.
    ///
    /// Expiry is not detected; a stale cookie still counts.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        let Ok(url) = Url::parse(&self.endpoint(MEMBER_ENDPOINT)) else {
            return false;
        };
        self.jar
            .cookies(&url)
            .and_then(|header| header.to_str().map(ToString::to_string).ok())
            .is_some_and(|cookies| {
                cookies.split(';').any(|pair| {
                    pair.trim()
                        .split_once('=')
                        .is_some_and(|(name, value)| name == SESSION_COOKIE && !value.is_empty())
                })
            })
    }

    /// Log in and keep the session cookies for later calls.
    ///
    /// # Errors
    ///
    /// Returns [`ForumError::Authentication`] if the login form is missing, the
    /// response lists errors, or the response does not set a session cookie,
    /// and [`ForumError::Http`] on transport failures.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let member_url = self.endpoint(MEMBER_ENDPOINT);
        let page = self.get_page(&format!("{member_url}?action=login")).await?;

        let Some(post_key) = extract::form_tokens(&page).post_key else {
            return Err(ForumError::Authentication("login form not found".to_string()));
        };

        let form = [
            ("action", "do_login"),
            ("url", ""),
            ("username", username),
            ("password", password),
            ("remember", "yes"),
            ("my_post_key", post_key.as_str()),
        ];

        // MyBB answers a good login with a redirect carrying the session cookie;
        // judge this response alone, since the jar may hold an older session.
        debug!(url = %member_url, username = %username, "Submitting login form");
        let response = self
            .no_redirect
            .post(&member_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let issued = response
            .cookies()
            .any(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty());
        let html = response.text().await?;

        let errors = extract::error_messages(&html);
        if !errors.is_empty() {
            warn!(username = %username, errors = ?errors, "Login rejected");
            return Err(ForumError::Authentication(errors.join("; ")));
        }
        if !issued {
            warn!(username = %username, "Login rejected");
            return Err(ForumError::Authentication(format!(
                "no {SESSION_COOKIE} cookie issued for {username}"
            )));
        }

        info!(username = %username, "Logged in");
        Ok(())
    }

    /// Post a new thread to sub-forum `forum_id` and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`ForumError::Submission`] if the forum rejects the form or the
    /// new thread id cannot be found in the response.
    pub async fn create_thread(&self, forum_id: u64, title: &str, body: &str) -> Result<ThreadId> {
        let url = format!("{}?fid={forum_id}", self.endpoint(NEW_THREAD_ENDPOINT));
        let page = self.get_page(&url).await?;
        let tokens = extract::form_tokens(&page);

        let fid = forum_id.to_string();
        let form = [
            ("action", "do_newthread"),
            ("subject", title),
            ("message", body),
            ("fid", fid.as_str()),
            ("posthash", tokens.post_hash.as_deref().unwrap_or_default()),
            ("my_post_key", tokens.post_key.as_deref().unwrap_or_default()),
            ("submit", "Post Thread"),
        ];

        debug!(url = %url, forum_id, "Submitting new thread");
        let response = self.no_redirect.post(&url).form(&form).send().await?;
        let response_url = response.url().clone();

        if response.status().is_redirection() {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                let target = response_url.join(location)?;
                return match extract::thread_id_from_url(&target) {
                    Some(thread_id) => {
                        info!(forum_id, thread_id, "Thread created");
                        Ok(thread_id)
                    }
                    None => Err(ForumError::Submission(format!(
                        "redirect target {target} does not name a thread"
                    ))),
                };
            }
        }

        let html = response.error_for_status()?.text().await?;
        reject_on_inline_errors(&html)?;

        let thread_id = meta_refresh_url(&response_url, &html)?
            .and_then(|target| extract::thread_id_from_url(&target))
            .or_else(|| extract::thread_id_from_url(&response_url))
            .ok_or_else(|| {
                ForumError::Submission("no thread id found in the response".to_string())
            })?;

        info!(forum_id, thread_id, "Thread created");
        Ok(thread_id)
    }

    /// Reply to a thread and return the new post's id.
    ///
    /// `reply_to` quotes an existing post.
    ///
    /// # Errors
    ///
    /// Returns [`ForumError::Submission`] if the forum rejects the reply or
    /// the new post id cannot be found in the response.
    pub async fn reply_thread(
        &self,
        thread_id: ThreadId,
        message: &str,
        reply_to: Option<PostId>,
    ) -> Result<PostId> {
        let url = format!("{}?tid={thread_id}", self.endpoint(NEW_REPLY_ENDPOINT));
        let page = self.get_page(&url).await?;
        let tokens = extract::form_tokens(&page);

        let tid = thread_id.to_string();
        let reply_to = reply_to.map(|pid| pid.to_string());
        let mut form = vec![
            ("action", "do_newreply"),
            ("tid", tid.as_str()),
            ("subject", ""),
            ("message", message),
            ("posthash", tokens.post_hash.as_deref().unwrap_or_default()),
            ("my_post_key", tokens.post_key.as_deref().unwrap_or_default()),
            ("submit", "Post Reply"),
        ];
        if let Some(reply_to) = reply_to.as_deref() {
            form.push(("replyto", reply_to));
        }

        debug!(url = %url, thread_id, "Submitting reply");
        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let final_url = response.url().clone();
        let html = response.text().await?;
        reject_on_inline_errors(&html)?;

        let post_id = meta_refresh_url(&final_url, &html)?
            .and_then(|target| extract::id_param(&target, "pid"))
            .or_else(|| extract::id_param(&final_url, "pid"))
            .ok_or_else(|| {
                ForumError::Submission("no post id found in the response".to_string())
            })?;

        info!(thread_id, post_id, "Reply posted");
        Ok(post_id)
    }

    /// Fetch a thread page and return every post on it, in page order.
    ///
    /// # Errors
    ///
    /// Returns [`ForumError::Http`] if the page cannot be fetched.
    pub async fn fetch_posts(&self, thread_id: ThreadId) -> Result<Vec<Post>> {
        let url = format!("{}?tid={thread_id}", self.endpoint(SHOW_THREAD_ENDPOINT));
        let html = self.get_page(&url).await?;
        let posts = extract::extract_posts(&html);
        debug!(thread_id, count = posts.len(), "Parsed thread page");
        Ok(posts)
    }

    async fn get_page(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Fetching page");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Fail with the forum's own messages when a form comes back with errors.
fn reject_on_inline_errors(html: &str) -> Result<()> {
    let errors = extract::error_messages(html);
    if errors.is_empty() {
        return Ok(());
    }
    warn!(errors = ?errors, "Forum rejected submission");
    Err(ForumError::Submission(errors.join("; ")))
}

/// Meta-refresh target of `html`, resolved against the page URL.
fn meta_refresh_url(page_url: &Url, html: &str) -> Result<Option<Url>> {
    extract::meta_refresh_target(html)
        .map(|target| page_url.join(&target))
        .transpose()
        .map_err(ForumError::from)
}
