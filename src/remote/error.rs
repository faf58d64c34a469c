use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by calls to the control server.
///
/// Retry and termination policy belongs to the supervisor; none of the
/// request helpers retry on their own.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("API request failed: {0}")]
    Network(reqwest::Error),

    /// Remote replied with a non-success status.
    #[error("remote returned error: ({0}) {1}")]
    Status(StatusCode, String),

    /// Remote no longer accepts the session token.
    #[error("session token rejected: ({0}) {1}")]
    Unauthorized(StatusCode, String),

    /// Remote replied with success but the body is not what we expect.
    #[error("failed to decode response: {0}")]
    Malformed(reqwest::Error),
}

impl ApiError {
    /// Map a non-success reply on a token-bearing request, distinguishing
    /// auth-class statuses so the caller can re-authenticate instead of
    /// giving up.
    pub(super) fn for_session(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ApiError::Unauthorized(status, body)
            }
            _ => ApiError::Status(status, body),
        }
    }
}
