use thiserror::Error;

/// Errors returned by [`ForumClient`](crate::ForumClient) operations.
#[derive(Debug, Error)]
pub enum ForumError {
    /// The forum rejected the credentials or the login page was not recognised.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A thread or reply form was rejected, or its result could not be parsed.
    #[error("submission failed: {0}")]
    Submission(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T, E = ForumError> = std::result::Result<T, E>;
