// =============================================================================
// Rooted Hearts Backend - Conversations API
// =============================================================================
// Express interest, reply, and the mutual photo-consent handshake. Every
// state change goes through `Database::transition_conversation`, which runs
// the domain transition inside one transaction.
// =============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rooted_hearts_common::interaction::{Message, PhotoConsent};
use rooted_hearts_common::{Conversation, ConversationStatus, InteractionError, UserStatus};
use serde::{Deserialize, Serialize};

use crate::auth::{require_full_access, AuthUser};
use crate::error::AppError;
use crate::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ExpressInterestRequest {
    pub recipient_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub initiator_id: String,
    pub recipient_id: String,
    pub status: ConversationStatus,
    pub photos_unlocked: bool,
    pub messages: Vec<Message>,
    pub initiator_consent: PhotoConsent,
    pub recipient_consent: PhotoConsent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            status: c.status(),
            photos_unlocked: c.photos_unlocked(),
            id: c.id,
            initiator_id: c.initiator_id,
            recipient_id: c.recipient_id,
            messages: c.messages,
            initiator_consent: c.initiator_consent,
            recipient_consent: c.recipient_consent,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Inbox row.
#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub other_user_id: String,
    pub other_display_name: Option<String>,
    pub status: ConversationStatus,
    pub photos_unlocked: bool,
    pub message_count: usize,
    pub last_message_at: Option<DateTime<Utc>>,
    pub you_consented: bool,
    pub they_consented: bool,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List the caller's conversations.
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let conversations = state.db.conversations_for_user(&auth.user_id).await?;

    let mut summaries = Vec::with_capacity(conversations.len());
    for c in conversations {
        let other_user_id = c.other_participant(&auth.user_id)?.to_string();
        let other_display_name = state
            .db
            .find_user_by_id(&other_user_id)
            .await?
            .map(|u| u.display_name);

        summaries.push(ConversationSummary {
            status: c.status(),
            photos_unlocked: c.photos_unlocked(),
            message_count: c.messages.len(),
            last_message_at: c.messages.last().map(|m| m.sent_at),
            you_consented: c.consent_of(&auth.user_id)?.has_consented,
            they_consented: c.consent_of(&other_user_id)?.has_consented,
            id: c.id,
            other_user_id,
            other_display_name,
            updated_at: c.updated_at,
        });
    }

    Ok(Json(summaries))
}

/// Express interest in another member, opening a conversation.
pub async fn express_interest(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ExpressInterestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sender = auth.load(&state).await?;
    require_full_access(&sender)?;

    if req.recipient_id == sender.id {
        return Err(InteractionError::SelfInteraction.into());
    }

    let now = Utc::now();
    let recipient = state
        .db
        .load_user(&req.recipient_id, now)
        .await?
        .ok_or(AppError::UserNotFound)?;
    if recipient.effective_status(now) != UserStatus::Active || !recipient.assessment_passed {
        return Err(AppError::Forbidden(
            "This member is not available for new conversations".into(),
        ));
    }

    let conversation = Conversation::open(&sender.id, &recipient.id, &req.message, now)?;
    state.db.create_conversation::<AppError>(&conversation).await?;

    tracing::info!(conversation = %conversation.id, "Conversation opened");

    Ok((StatusCode::CREATED, Json(ConversationResponse::from(conversation))))
}

/// Conversation detail for a participant.
pub async fn get_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state
        .db
        .find_conversation(&id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !conversation.is_participant(&auth.user_id) {
        return Err(InteractionError::NotParticipant(auth.user_id).into());
    }

    Ok(Json(conversation.into()))
}

/// Reply in a conversation.
pub async fn respond(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let sender = auth.load(&state).await?;
    require_full_access(&sender)?;

    let now = Utc::now();
    let (conversation, status) = state
        .db
        .transition_conversation(&id, |c| {
            c.respond(&sender.id, &req.message, now)
                .map_err(AppError::from)
        })
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::debug!(conversation = %conversation.id, %status, "Response recorded");
    Ok(Json(conversation.into()))
}

/// Consent to share photos in this conversation.
pub async fn grant_consent(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let user = auth.load(&state).await?;
    require_full_access(&user)?;

    let now = Utc::now();
    let (conversation, status) = state
        .db
        .transition_conversation(&id, |c| {
            c.grant_photo_consent(&user.id, now).map_err(AppError::from)
        })
        .await?
        .ok_or(AppError::NotFound)?;

    if status == ConversationStatus::PhotosUnlocked {
        tracing::info!(conversation = %conversation.id, "Photos unlocked");
    }
    Ok(Json(conversation.into()))
}

/// Withdraw photo consent. Always allowed for a participant.
pub async fn withdraw_consent(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let now = Utc::now();
    let (conversation, _) = state
        .db
        .transition_conversation(&id, |c| {
            c.withdraw_photo_consent(&auth.user_id, now)
                .map_err(AppError::from)
        })
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(conversation = %conversation.id, "Photo consent withdrawn");
    Ok(Json(conversation.into()))
}
