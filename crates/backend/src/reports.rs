// =============================================================================
// Rooted Hearts Backend - Reports & Support API
// =============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rooted_hearts_common::moderation::{validate_report, validate_support_message, ReportReason};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::SupportMessage;
use crate::error::AppError;
use crate::AppState;

const MAX_SUBJECT_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub reported_user_id: String,
    pub reason: ReportReason,
    pub details: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupportRequest {
    pub subject: String,
    pub message: String,
}

/// Report another member for admin review.
pub async fn create_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_report(&auth.user_id, &req.reported_user_id, &req.details)?;

    if state.db.find_user_by_id(&req.reported_user_id).await?.is_none() {
        return Err(AppError::UserNotFound);
    }

    let report = state
        .db
        .create_report(&auth.user_id, &req.reported_user_id, req.reason.as_str(), &req.details)
        .await?;

    tracing::info!(report_id = %report.id, reason = %report.reason, "Report filed");
    Ok((StatusCode::CREATED, Json(report)))
}

/// Open a support ticket.
pub async fn create_support_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateSupportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let subject = req.subject.trim();
    if subject.is_empty() || subject.chars().count() > MAX_SUBJECT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Subject must be between 1 and {} characters",
            MAX_SUBJECT_CHARS
        )));
    }
    validate_support_message(&req.message)?;

    let ticket = state
        .db
        .create_support_message(&auth.user_id, subject, &req.message)
        .await?;

    tracing::info!(ticket_id = %ticket.id, "Support ticket opened");
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// The caller's own support tickets.
pub async fn get_my_support_messages(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<SupportMessage>>, AppError> {
    Ok(Json(state.db.list_support_messages(Some(&auth.user_id)).await?))
}
