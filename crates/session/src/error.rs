//! Session error types.

use thiserror::Error;

/// Failures of the persistence port.
///
/// The store logs these and carries on; they never abort a session change.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from talking to the storefront or the commerce API.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storefront answered with an `{"error": ...}` body.
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The commerce API answered with GraphQL errors.
    #[error("GraphQL error: {0}")]
    GraphQL(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Maximum length for response bodies quoted in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 300;

impl SessionError {
    /// Build an `InvalidResponse` quoting at most a few hundred characters of `body`.
    pub(crate) fn invalid_body(context: &str, body: &str) -> Self {
        let excerpt: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        Self::InvalidResponse(format!("{context}: {excerpt}"))
    }
}
