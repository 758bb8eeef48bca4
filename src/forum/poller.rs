//! Thread polling: diff each fetched page against the caller's seen ids.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info};

use super::{ForumClient, Post, PostId, ThreadId};
use crate::error::Result;

impl ForumClient {
    /// Fetch a thread once and return the posts whose ids are not in `seen`.
    ///
    /// The ids of the returned posts are appended to `seen` in page order, so a
    /// second call against an unchanged thread returns nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread page cannot be fetched.
    pub async fn poll_once(
        &self,
        thread_id: ThreadId,
        seen: &mut Vec<PostId>,
    ) -> Result<Vec<Post>> {
        let posts = self.fetch_posts(thread_id).await?;
        let new_posts = take_unseen(posts, seen);

        if new_posts.is_empty() {
            debug!(thread_id, "No new posts");
        } else {
            info!(thread_id, new_posts = new_posts.len(), "New posts found");
        }

        Ok(new_posts)
    }

    /// Poll a thread until it shows posts or `timeout` elapses.
    ///
    /// Starts from an empty seen list, so any post already on the page counts
    /// as new. Use [`poll_thread_since`](Self::poll_thread_since) to wait for
    /// replies beyond a known baseline.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error; no retries are made.
    pub async fn poll_thread(
        &self,
        thread_id: ThreadId,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Vec<Post>> {
        let mut seen = Vec::new();
        self.poll_thread_since(thread_id, &mut seen, interval, timeout).await
    }

    /// Poll a thread every `interval` until a post not in `seen` appears or
    /// `timeout` elapses. Returns an empty list on timeout.
    ///
    /// Sleeps never run past the deadline and a fetch still in flight at
    /// `timeout + interval` is abandoned, so the call always returns within
    /// that bound. An abandoned fetch leaves `seen` untouched.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error; no retries are made.
    pub async fn poll_thread_since(
        &self,
        thread_id: ThreadId,
        seen: &mut Vec<PostId>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Vec<Post>> {
        let start = Instant::now();
        let hard_deadline = start + timeout + interval;
        let mut attempts = 0u32;

        while start.elapsed() < timeout {
            attempts += 1;
            let Ok(polled) = timeout_at(hard_deadline, self.poll_once(thread_id, seen)).await
            else {
                debug!(thread_id, attempts, "Fetch outlived the polling deadline");
                return Ok(Vec::new());
            };
            let new_posts = polled?;
            if !new_posts.is_empty() {
                return Ok(new_posts);
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            sleep(interval.min(remaining)).await;
        }

        debug!(thread_id, attempts, "Polling timed out without new posts");
        Ok(Vec::new())
    }
}

/// Keep posts whose ids are neither in `seen` nor earlier on the same page,
/// recording their ids in `seen`.
fn take_unseen(posts: Vec<Post>, seen: &mut Vec<PostId>) -> Vec<Post> {
    let mut known: HashSet<PostId> = seen.iter().copied().collect();
    let mut new_posts = Vec::new();

    for post in posts {
        if known.insert(post.id) {
            seen.push(post.id);
            new_posts.push(post);
        }
    }

    new_posts
}
