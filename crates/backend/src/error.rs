// =============================================================================
// Rooted Hearts Backend - Error Types
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rooted_hearts_common::{AssessmentError, InteractionError, ModerationError};
use serde_json::json;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserExists,

    #[error("This account has been permanently removed")]
    IdentityRevoked,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Assessment(#[from] AssessmentError),

    #[error(transparent)]
    Interaction(#[from] InteractionError),

    #[error(transparent)]
    Moderation(#[from] ModerationError),

    #[error("Resource not found")]
    NotFound,

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_)
            | AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::TokenExpired => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UserExists | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::IdentityRevoked | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Assessment(e) => match e {
                AssessmentError::RetakeLocked { .. } => StatusCode::TOO_MANY_REQUESTS,
                AssessmentError::Suspended { .. } => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_REQUEST,
            },
            AppError::Interaction(e) => match e {
                InteractionError::NotParticipant(_) => StatusCode::FORBIDDEN,
                InteractionError::AlreadyExists => StatusCode::CONFLICT,
                InteractionError::ConsentUnavailable => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            },
            AppError::Moderation(e) => match e {
                ModerationError::InvalidTransition { .. } => StatusCode::CONFLICT,
                ModerationError::SelfModeration => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal => "Internal server error".to_string(),
            AppError::Auth(msg) | AppError::Forbidden(msg) | AppError::BadRequest(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": message,
        });
        if let AppError::Assessment(AssessmentError::RetakeLocked { eligible_at }) = &self {
            body["retake_eligible_at"] = json!(eligible_at);
        }

        (status, Json(body)).into_response()
    }
}
