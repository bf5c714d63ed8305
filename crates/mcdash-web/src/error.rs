//! API error types
//!
//! Every error is answered with a plain-text body, matching what the
//! dashboard client expects from its fetch calls.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use mcdash_tail::TailError;

use crate::restart::RestartError;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request parameters
    #[error("{0}")]
    BadRequest(String),

    /// No identity on the request
    #[error("Unauthorized")]
    Unauthorized,

    /// Identity present but not allow-listed
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// A log stream could not be opened
    #[error("Failed to open log stream: {0}")]
    Subscribe(#[from] TailError),

    /// The restart command failed
    #[error("Failed to restart server: {0}")]
    Restart(#[from] RestartError),

    /// Internal server error
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Subscribe(_) | Self::Restart(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::warn!(error_message = %message, status = %status, "API error");
        } else {
            tracing::debug!(error_message = %message, status = %status, "request rejected");
        }

        (status, message).into_response()
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::BadRequest("nope".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TailError::TooManySubscriptions { max: 1 }).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_restart_message() {
        let err = ApiError::from(RestartError::Failed {
            status: "exit status: 1".into(),
            stderr: "no such container".into(),
        });
        assert_eq!(
            err.to_string(),
            "Failed to restart server: exit status: 1: no such container"
        );
    }
}
