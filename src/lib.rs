//! Forum client library.
//!
//! Logs in to a MyBB forum, posts threads and replies, and polls threads for
//! new posts by scraping the rendered pages.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod config;
pub mod constants;
pub mod error;
pub mod forum;

pub use config::Config;
pub use error::{ForumError, Result};
pub use forum::{ForumClient, Post, PostId, ThreadId};
