// =============================================================================
// Rooted Hearts Backend - Admin API
// =============================================================================
// Dashboard, user moderation, background checks, and the report and support
// queues. Every handler here requires an admin account.
// =============================================================================

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rooted_hearts_common::moderation::{apply_action, ModerationOutcome};
use rooted_hearts_common::{
    BackgroundCheckStatus, ModerationAction, ModerationError, ReportStatus, SupportStatus,
    UserStatus,
};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, AuthUser};
use crate::db::{DashboardStats, ModerationRecord, Report, SupportMessage, User, UserResponse};
use crate::error::AppError;
use crate::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub status: Option<UserStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub action: ModerationAction,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ModerateResponse {
    pub user_id: String,
    pub action: ModerationAction,
    /// `None` once the account has been removed
    pub user_status: Option<UserStatus>,
    pub suspension_end_date: Option<DateTime<Utc>>,
    pub warning_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BackgroundCheckRequest {
    pub status: BackgroundCheckStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    pub status: Option<ReportStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReportRequest {
    pub status: ReportStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSupportRequest {
    pub status: Option<SupportStatus>,
    pub admin_response: Option<String>,
}

async fn load_admin(state: &AppState, auth: &AuthUser) -> Result<User, AppError> {
    let admin = auth.load(state).await?;
    require_admin(&admin)?;
    Ok(admin)
}

// =============================================================================
// Dashboard & Users
// =============================================================================

pub async fn get_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<DashboardStats>, AppError> {
    load_admin(&state, &auth).await?;
    Ok(Json(state.db.dashboard_stats().await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    load_admin(&state, &auth).await?;
    let users = state.db.list_users(query.status).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Warn, suspend or remove a member.
pub async fn moderate_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ModerateRequest>,
) -> Result<Json<ModerateResponse>, AppError> {
    let admin = load_admin(&state, &auth).await?;
    if admin.id == id {
        return Err(ModerationError::SelfModeration.into());
    }
    let reason = req.reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest("A reason is required".into()));
    }

    let now = Utc::now();
    let target = state
        .db
        .load_user(&id, now)
        .await?
        .ok_or(AppError::UserNotFound)?;

    match apply_action(req.action, now) {
        ModerationOutcome::Warned => {
            state.db.warn_user(&target.id, &admin.id, reason, now).await?;
        }
        ModerationOutcome::Suspended { until } => {
            state
                .db
                .suspend_user(&target.id, &admin.id, reason, until, now)
                .await?;
        }
        ModerationOutcome::Removed => {
            state.db.remove_user(&target, &admin.id, reason, now).await?;
        }
    }

    tracing::info!(
        user_id = %target.id,
        admin_id = %admin.id,
        action = %req.action,
        "Moderation action applied"
    );

    let updated = state.db.find_user_by_id(&target.id).await?;
    Ok(Json(ModerateResponse {
        user_id: target.id,
        action: req.action,
        user_status: updated.as_ref().map(User::status),
        suspension_end_date: updated.as_ref().and_then(|u| u.suspension_end_date),
        warning_count: updated.as_ref().map(|u| u.warning_count),
    }))
}

/// Audit trail for one member.
pub async fn get_moderation_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<ModerationRecord>>, AppError> {
    load_admin(&state, &auth).await?;
    Ok(Json(state.db.moderation_history(&id).await?))
}

pub async fn set_background_check(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<BackgroundCheckRequest>,
) -> Result<Json<UserResponse>, AppError> {
    load_admin(&state, &auth).await?;

    if !state.db.set_background_check(&id, req.status).await? {
        return Err(AppError::UserNotFound);
    }

    let user = state
        .db
        .find_user_by_id(&id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(user.into()))
}

// =============================================================================
// Reports
// =============================================================================

pub async fn list_reports(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ReportsQuery>,
) -> Result<Json<Vec<Report>>, AppError> {
    load_admin(&state, &auth).await?;
    Ok(Json(state.db.list_reports(query.status).await?))
}

/// Resolve or dismiss a pending report.
pub async fn update_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateReportRequest>,
) -> Result<Json<Report>, AppError> {
    load_admin(&state, &auth).await?;

    let report = state.db.find_report(&id).await?.ok_or(AppError::NotFound)?;
    let status = report.report_status().transition(req.status)?;

    state
        .db
        .update_report(&id, status, req.admin_notes.as_deref())
        .await?;

    let report = state.db.find_report(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(report))
}

// =============================================================================
// Support
// =============================================================================

pub async fn list_support_messages(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<SupportMessage>>, AppError> {
    load_admin(&state, &auth).await?;
    Ok(Json(state.db.list_support_messages(None).await?))
}

/// Move a ticket forward and/or attach a response.
pub async fn update_support_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateSupportRequest>,
) -> Result<Json<SupportMessage>, AppError> {
    load_admin(&state, &auth).await?;

    if req.status.is_none() && req.admin_response.is_none() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }

    let ticket = state
        .db
        .find_support_message(&id)
        .await?
        .ok_or(AppError::NotFound)?;

    let status = match req.status {
        Some(to) => ticket.support_status().transition(to)?,
        None => ticket.support_status(),
    };

    state
        .db
        .update_support_message(&id, status, req.admin_response.as_deref())
        .await?;

    let ticket = state
        .db
        .find_support_message(&id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ticket))
}
