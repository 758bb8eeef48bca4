//! Shared constants used across the client.

/// Forum root used when `FORUM_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://cultofgpt.org/forum";

/// User agent string sent with every forum request.
pub const DEFAULT_USER_AGENT: &str = concat!("forum-client/", env!("CARGO_PKG_VERSION"));

/// Cookie MyBB sets once a login succeeds.
pub const SESSION_COOKIE: &str = "mybbuser";

/// MyBB endpoints, relative to the forum root.
pub const MEMBER_ENDPOINT: &str = "member.php";
pub const NEW_THREAD_ENDPOINT: &str = "newthread.php";
pub const NEW_REPLY_ENDPOINT: &str = "newreply.php";
pub const SHOW_THREAD_ENDPOINT: &str = "showthread.php";

/// Hidden form fields carrying MyBB's CSRF token and draft hash.
pub const POST_KEY_FIELD: &str = "my_post_key";
pub const POST_HASH_FIELD: &str = "posthash";
