//! Error type for calls against the advisory platform API.

use thiserror::Error;

/// Failure of a single API request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to API at {0}")]
    Connect(String),

    #[error("Not authorized: the API rejected the session token")]
    Unauthorized,

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Classify a reqwest failure the same way for every endpoint.
    pub fn from_reqwest(err: reqwest::Error, base_url: &str, timeout_seconds: u64) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout_seconds)
        } else if err.is_connect() {
            ApiError::Connect(base_url.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }

    /// Build an error from a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 401 || status == 403 {
            ApiError::Unauthorized
        } else {
            ApiError::Status { status, body }
        }
    }
}
