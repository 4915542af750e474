//! # Interaction & Photo Consent
//!
//! A [`Conversation`] exists at most once per unordered pair of users. Its
//! status is computed from the messages and consent flags every time it is
//! read, so the two can never drift apart.
//!
//! ```text
//! pending_response ─(both sent ≥120 chars)─▶ both_messaged
//!        ─(one consents)─▶ awaiting_consent ─(both consent)─▶ photos_unlocked
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ParseEnumError;

/// Minimum length of a message that can advance a conversation.
pub const RESPONSE_MIN_CHARS: usize = 120;
/// Minimum length of the opening message that expresses interest.
pub const INTEREST_MIN_CHARS: usize = 50;
/// Upper bound for any single message.
pub const MESSAGE_MAX_CHARS: usize = 2000;

/// Deterministic id for the conversation between two users.
pub fn conversation_id(user_a: &str, user_b: &str) -> String {
    let (low, high) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("conv_{}_{}", low, high)
}

/// Character count used for all length rules.
pub fn message_length(body: &str) -> usize {
    body.trim().chars().count()
}

/// Check `body` against a minimum length and the global maximum.
pub fn validate_length(body: &str, min: usize) -> Result<(), InteractionError> {
    let len = message_length(body);
    if len < min {
        return Err(InteractionError::MessageTooShort { min, actual: len });
    }
    if len > MESSAGE_MAX_CHARS {
        return Err(InteractionError::MessageTooLong {
            max: MESSAGE_MAX_CHARS,
            actual: len,
        });
    }
    Ok(())
}

/// Derived conversation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    PendingResponse,
    BothMessaged,
    AwaitingConsent,
    PhotosUnlocked,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::PendingResponse => "pending_response",
            ConversationStatus::BothMessaged => "both_messaged",
            ConversationStatus::AwaitingConsent => "awaiting_consent",
            ConversationStatus::PhotosUnlocked => "photos_unlocked",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a message was sent as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Interest,
    Response,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Interest => "interest",
            MessageKind::Response => "response",
        }
    }
}

impl FromStr for MessageKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interest" => Ok(MessageKind::Interest),
            "response" => Ok(MessageKind::Response),
            other => Err(ParseEnumError::new("message kind", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub body: String,
    pub kind: MessageKind,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn is_substantive(&self) -> bool {
        message_length(&self.body) >= RESPONSE_MIN_CHARS
    }
}

/// One participant's photo consent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoConsent {
    pub has_consented: bool,
    pub consented_at: Option<DateTime<Utc>>,
}

/// Lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteractionError {
    #[error("cannot start a conversation with yourself")]
    SelfInteraction,

    #[error("user {0} is not a participant in this conversation")]
    NotParticipant(String),

    #[error("message must be at least {min} characters (got {actual})")]
    MessageTooShort { min: usize, actual: usize },

    #[error("message must be at most {max} characters (got {actual})")]
    MessageTooLong { max: usize, actual: usize },

    #[error("photo consent opens once both of you have exchanged a substantive message")]
    ConsentUnavailable,

    #[error("a conversation between these users already exists")]
    AlreadyExists,
}

/// Conversation between an initiator and a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub initiator_id: String,
    pub recipient_id: String,
    pub messages: Vec<Message>,
    pub initiator_consent: PhotoConsent,
    pub recipient_consent: PhotoConsent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Express interest: open a new conversation with an opening message.
    pub fn open(
        from_user: &str,
        to_user: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, InteractionError> {
        if from_user == to_user {
            return Err(InteractionError::SelfInteraction);
        }
        validate_length(message, INTEREST_MIN_CHARS)?;

        let mut conversation = Self {
            id: conversation_id(from_user, to_user),
            initiator_id: from_user.to_string(),
            recipient_id: to_user.to_string(),
            messages: Vec::new(),
            initiator_consent: PhotoConsent::default(),
            recipient_consent: PhotoConsent::default(),
            created_at: now,
            updated_at: now,
        };
        conversation.push_message(from_user, message, MessageKind::Interest, now);
        tracing::debug!(conversation = %conversation.id, "Interest expressed");
        Ok(conversation)
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.initiator_id == user_id || self.recipient_id == user_id
    }

    /// The participant that isn't `user_id`.
    pub fn other_participant(&self, user_id: &str) -> Result<&str, InteractionError> {
        if self.initiator_id == user_id {
            Ok(&self.recipient_id)
        } else if self.recipient_id == user_id {
            Ok(&self.initiator_id)
        } else {
            Err(InteractionError::NotParticipant(user_id.to_string()))
        }
    }

    pub fn consent_of(&self, user_id: &str) -> Result<&PhotoConsent, InteractionError> {
        if self.initiator_id == user_id {
            Ok(&self.initiator_consent)
        } else if self.recipient_id == user_id {
            Ok(&self.recipient_consent)
        } else {
            Err(InteractionError::NotParticipant(user_id.to_string()))
        }
    }

    fn consent_mut(&mut self, user_id: &str) -> Result<&mut PhotoConsent, InteractionError> {
        if self.initiator_id == user_id {
            Ok(&mut self.initiator_consent)
        } else if self.recipient_id == user_id {
            Ok(&mut self.recipient_consent)
        } else {
            Err(InteractionError::NotParticipant(user_id.to_string()))
        }
    }

    /// Whether `user_id` has sent at least one message of response length.
    pub fn has_substantive_message(&self, user_id: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.sender_id == user_id && m.is_substantive())
    }

    pub fn both_messaged(&self) -> bool {
        self.has_substantive_message(&self.initiator_id)
            && self.has_substantive_message(&self.recipient_id)
    }

    pub fn photos_unlocked(&self) -> bool {
        self.initiator_consent.has_consented && self.recipient_consent.has_consented
    }

    pub fn status(&self) -> ConversationStatus {
        if self.photos_unlocked() {
            ConversationStatus::PhotosUnlocked
        } else if self.initiator_consent.has_consented || self.recipient_consent.has_consented {
            ConversationStatus::AwaitingConsent
        } else if self.both_messaged() {
            ConversationStatus::BothMessaged
        } else {
            ConversationStatus::PendingResponse
        }
    }

    /// Append a reply from a participant.
    pub fn respond(
        &mut self,
        sender_id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<ConversationStatus, InteractionError> {
        if !self.is_participant(sender_id) {
            return Err(InteractionError::NotParticipant(sender_id.to_string()));
        }
        validate_length(message, RESPONSE_MIN_CHARS)?;

        self.push_message(sender_id, message, MessageKind::Response, now);
        Ok(self.status())
    }

    /// Record `user_id`'s consent to share photos.
    pub fn grant_photo_consent(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConversationStatus, InteractionError> {
        if !self.is_participant(user_id) {
            return Err(InteractionError::NotParticipant(user_id.to_string()));
        }
        if !self.both_messaged() {
            return Err(InteractionError::ConsentUnavailable);
        }

        let consent = self.consent_mut(user_id)?;
        if !consent.has_consented {
            consent.has_consented = true;
            consent.consented_at = Some(now);
            self.updated_at = now;
        }
        let status = self.status();
        tracing::debug!(conversation = %self.id, %status, "Photo consent granted");
        Ok(status)
    }

    /// Withdraw `user_id`'s consent. Photos lock again immediately.
    pub fn withdraw_photo_consent(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConversationStatus, InteractionError> {
        let consent = self.consent_mut(user_id)?;
        if consent.has_consented {
            *consent = PhotoConsent::default();
            self.updated_at = now;
        }
        let status = self.status();
        tracing::debug!(conversation = %self.id, %status, "Photo consent withdrawn");
        Ok(status)
    }

    fn push_message(&mut self, sender_id: &str, body: &str, kind: MessageKind, now: DateTime<Utc>) {
        self.messages.push(Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            body: body.trim().to_string(),
            kind,
            sent_at: now,
        });
        self.updated_at = now;
    }
}
