use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::clients::store::StoreError;
use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Identity errors
/// - E3xxx: Discovery and matching errors
/// - E4xxx: Messaging errors
/// - E5xxx: Verification errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,

    // Identity (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    WalletAlreadyExists,
    UserNotFound,
    InvalidStatusTransition,

    // Discovery / matching (E3xxx)
    AlreadySwiped,
    CannotSwipeSelf,
    MatchNotFound,

    // Messaging (E4xxx)
    ConversationNotFound,
    NotConversationMember,
    EmptyContent,

    // Verification (E5xxx)
    VerificationTypeMismatch,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",

            // Identity
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::WalletAlreadyExists => "E1003",
            Self::UserNotFound => "E1004",
            Self::InvalidStatusTransition => "E1005",

            // Discovery / matching
            Self::AlreadySwiped => "E3001",
            Self::CannotSwipeSelf => "E3002",
            Self::MatchNotFound => "E3003",

            // Messaging
            Self::ConversationNotFound => "E4001",
            Self::NotConversationMember => "E4002",
            Self::EmptyContent => "E4003",

            // Verification
            Self::VerificationTypeMismatch => "E5001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            // Duplicate email is surfaced as a plain 400 to signup clients.
            Self::ValidationError | Self::EmailAlreadyExists | Self::InvalidStatusTransition
            | Self::CannotSwipeSelf | Self::EmptyContent => StatusCode::BAD_REQUEST,
            Self::UserNotFound | Self::MatchNotFound | Self::ConversationNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotConversationMember | Self::VerificationTypeMismatch => StatusCode::FORBIDDEN,
            Self::WalletAlreadyExists | Self::AlreadySwiped => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The taxonomy code, if this is a known application error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Known { code, .. } => Some(*code),
            AppError::Validation(_) => Some(ErrorCode::ValidationError),
            AppError::Internal(_) | AppError::Store(_) => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Store(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "storage error"),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn known_error_carries_code_and_status() {
        let (status, value) =
            body_json(AppError::new(ErrorCode::NotConversationMember, "not yours")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E4002");
        assert_eq!(value["error"]["message"], "not yours");
    }

    #[tokio::test]
    async fn duplicate_email_is_bad_request() {
        let (status, value) =
            body_json(AppError::new(ErrorCode::EmailAlreadyExists, "taken")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"]["code"], "E1002");
    }

    #[tokio::test]
    async fn store_failure_hides_detail() {
        let err = AppError::from(StoreError::Persistence("disk full".into()));
        let (status, value) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"]["message"], "storage error");
    }

    #[test]
    fn validation_maps_to_validation_code() {
        let err = AppError::Validation("bad".into());
        assert_eq!(err.code(), Some(ErrorCode::ValidationError));
        assert_eq!(ErrorCode::ValidationError.status_code(), StatusCode::BAD_REQUEST);
    }
}
