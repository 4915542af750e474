// =============================================================================
// Rooted Hearts Backend - Assessment API
// =============================================================================
// Serves the question catalog, scores submissions and places the member.
// Scores always come from the server-side catalog, never from the client.
// =============================================================================

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use rooted_hearts_common::assessment::catalog::QuestionView;
use rooted_hearts_common::assessment::{
    check_attempt_allowed, growth_plan, next_retake_at, placement_for, GrowthRecommendation,
    FOLLOW_UP_TRIGGER, PASS_THRESHOLD, RED_FLAG_LIMIT,
};
use rooted_hearts_common::{AssessmentError, AssessmentResult, AssessmentSession, UserStatus};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub primary: Vec<QuestionView>,
    pub follow_up: Vec<QuestionView>,
    pub pass_threshold: u8,
    pub follow_up_trigger: usize,
    pub red_flag_limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct QuestionResponse {
    pub question_id: String,
    pub option_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Answers in the order they were given, follow-ups included.
    pub responses: Vec<QuestionResponse>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub result: AssessmentResult,
    pub user_status: UserStatus,
    pub retake_eligible_at: DateTime<Utc>,
    pub growth_plan: Vec<GrowthRecommendation>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub assessment_passed: bool,
    pub alignment_score: Option<i64>,
    pub last_assessment_at: Option<DateTime<Utc>>,
    pub user_status: UserStatus,
    pub can_retake: bool,
    pub retake_eligible_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct GrowthResponse {
    pub result: AssessmentResult,
    pub growth_plan: Vec<GrowthRecommendation>,
    pub retake_eligible_at: DateTime<Utc>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Public question catalog, scores stripped.
pub async fn get_questions(State(state): State<AppState>) -> Json<QuestionsResponse> {
    Json(QuestionsResponse {
        primary: state.catalog.primary().iter().map(|q| q.public_view()).collect(),
        follow_up: state.catalog.follow_up().iter().map(|q| q.public_view()).collect(),
        pass_threshold: PASS_THRESHOLD,
        follow_up_trigger: FOLLOW_UP_TRIGGER,
        red_flag_limit: RED_FLAG_LIMIT,
    })
}

/// Score a completed attempt and place the member.
pub async fn submit_assessment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let user = auth.load(&state).await?;
    let now = Utc::now();

    check_attempt_allowed(user.status(), user.suspension_end_date, user.last_assessment_at, now)?;

    if req.responses.is_empty() {
        return Err(AssessmentError::NoAnswers.into());
    }

    let result = AssessmentSession::replay(
        state.catalog,
        req.responses
            .iter()
            .map(|r| (r.question_id.as_str(), r.option_id.as_str())),
    )?;
    let user_status = placement_for(&result);

    state
        .db
        .record_assessment::<AppError>(&user.id, &result, user_status, now)
        .await?;

    tracing::info!(
        user_id = %user.id,
        percentage = result.percentage,
        red_flags = result.red_flag_count,
        passed = result.passed,
        status = %user_status.as_str(),
        "Assessment scored"
    );

    Ok(Json(SubmitResponse {
        growth_plan: growth_plan(&result),
        result,
        user_status,
        retake_eligible_at: next_retake_at(now),
    }))
}

/// Current placement and retake eligibility.
pub async fn get_status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<StatusResponse>, AppError> {
    let user = auth.load(&state).await?;
    let now = Utc::now();

    Ok(Json(StatusResponse {
        assessment_passed: user.assessment_passed,
        alignment_score: user.alignment_score,
        last_assessment_at: user.last_assessment_at,
        user_status: user.effective_status(now),
        can_retake: check_attempt_allowed(
            user.status(),
            user.suspension_end_date,
            user.last_assessment_at,
            now,
        )
        .is_ok(),
        retake_eligible_at: user.last_assessment_at.map(next_retake_at),
    }))
}

/// Growth plan built from the latest attempt.
pub async fn get_growth_plan(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<GrowthResponse>, AppError> {
    let attempt = state
        .db
        .latest_attempt(&auth.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let result = attempt.to_result();
    Ok(Json(GrowthResponse {
        growth_plan: growth_plan(&result),
        retake_eligible_at: next_retake_at(attempt.completed_at),
        result,
    }))
}
