//! # Rooted Hearts Common
//!
//! Domain rules shared by the API server. Everything here is pure: callers
//! pass in the clock and own persistence.
//!
//! ## Table of Contents
//! - **assessment**: question catalog, scoring, session flow, retake gating, growth plans
//! - **interaction**: conversation and mutual photo-consent lifecycle
//! - **moderation**: warn/suspend/remove policy, report and support ticket states
//! - **user**: account status enums

pub mod assessment;
pub mod interaction;
pub mod moderation;
pub mod user;

pub use assessment::{
    calculate_assessment_result, AssessmentAnswer, AssessmentCatalog, AssessmentError,
    AssessmentResult, AssessmentSession, Category,
};
pub use interaction::{conversation_id, Conversation, ConversationStatus, InteractionError};
pub use moderation::{ModerationAction, ModerationError, ReportStatus, SupportStatus};
pub use user::{BackgroundCheckStatus, MembershipTier, UserStatus};

/// Error returned when parsing one of the string-backed domain enums.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
