use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

/// Step of the conversation deletion workflow that a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStep {
    CheckAccess,
    Messages,
    Participants,
    Conversation,
}

impl std::fmt::Display for DeletionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionStep::CheckAccess => write!(f, "check access"),
            DeletionStep::Messages => write!(f, "delete messages"),
            DeletionStep::Participants => write!(f, "delete participants"),
            DeletionStep::Conversation => write!(f, "delete conversation"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Deletion failed at step '{step}': {source}")]
    Deletion {
        step: DeletionStep,
        source: BackendError,
    },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    InternalError,

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn no_session() -> Self {
        AppError::Authentication("No active session".to_string())
    }

    pub fn no_access() -> Self {
        AppError::Authorization("No access to this conversation".to_string())
    }

    /// Whether the client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Write(_) | AppError::Backend(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, error_message) = match self {
            AppError::Backend(ref e) => {
                tracing::error!("Backend error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Write(msg) => {
                tracing::warn!("Write failed: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::Deletion { step, ref source } => {
                tracing::error!("Deletion failed at {}: {:?}", step, source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to {}", step),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_step_display() {
        assert_eq!(DeletionStep::CheckAccess.to_string(), "check access");
        assert_eq!(DeletionStep::Messages.to_string(), "delete messages");
        assert_eq!(DeletionStep::Participants.to_string(), "delete participants");
        assert_eq!(DeletionStep::Conversation.to_string(), "delete conversation");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::no_session().into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::no_access().into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Write("insert failed".into()).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_write_errors_are_retryable() {
        assert!(AppError::Write("x".into()).is_retryable());
        assert!(!AppError::no_access().is_retryable());
    }
}
