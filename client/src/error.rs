use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Non-2xx response that is not recoverable through a token refresh. The
    /// body is carried verbatim so callers can surface the server's message.
    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The stored refresh token was missing or rejected; credentials have
    /// been cleared and the user must sign in again.
    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("unexpected response from server: {0}")]
    UnexpectedResponse(String),
}
