//! # Moderation
//!
//! Enforcement tiers, user reports and support tickets.
//!
//! - **Warn**: logged notice, no status change
//! - **Suspend**: six months, then the account drops into Growth Mode
//! - **Remove**: permanent; the identity is revoked so it can't sign up again

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::user::UserStatus;
use crate::ParseEnumError;

pub const SUSPENSION_MONTHS: u32 = 6;
/// Minimum length of the free-text part of a report.
pub const REPORT_DETAILS_MIN_CHARS: usize = 20;
/// Minimum length of a support ticket message.
pub const SUPPORT_MESSAGE_MIN_CHARS: usize = 20;

/// Admin enforcement action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModerationAction {
    Warn,
    Suspend,
    Remove,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Warn => "warn",
            ModerationAction::Suspend => "suspend",
            ModerationAction::Remove => "remove",
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warn" => Ok(ModerationAction::Warn),
            "suspend" => Ok(ModerationAction::Suspend),
            "remove" => Ok(ModerationAction::Remove),
            other => Err(ParseEnumError::new("moderation action", other)),
        }
    }
}

/// What an action does to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    /// Status unchanged, warning count incremented
    Warned,
    /// New status and suspension end
    Suspended { until: DateTime<Utc> },
    /// Account and identity removed
    Removed,
}

/// Work out the effect of `action` at `now`.
pub fn apply_action(action: ModerationAction, now: DateTime<Utc>) -> ModerationOutcome {
    match action {
        ModerationAction::Warn => ModerationOutcome::Warned,
        ModerationAction::Suspend => ModerationOutcome::Suspended {
            until: suspension_end(now),
        },
        ModerationAction::Remove => ModerationOutcome::Removed,
    }
}

pub fn suspension_end(from: DateTime<Utc>) -> DateTime<Utc> {
    from.checked_add_months(Months::new(SUSPENSION_MONTHS))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether an account with this status may browse and message.
pub fn has_full_access(status: UserStatus, assessment_passed: bool) -> bool {
    status == UserStatus::Active && assessment_passed
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModerationError {
    #[error("cannot move {kind} from {from} to {to}")]
    InvalidTransition {
        kind: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("you cannot report yourself")]
    SelfReport,

    #[error("admins cannot moderate their own account")]
    SelfModeration,
}

/// Why a user was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportReason {
    InappropriateContent,
    Harassment,
    FakeProfile,
    Spam,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::InappropriateContent => "inappropriate-content",
            ReportReason::Harassment => "harassment",
            ReportReason::FakeProfile => "fake-profile",
            ReportReason::Spam => "spam",
            ReportReason::Other => "other",
        }
    }
}

impl FromStr for ReportReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inappropriate-content" => Ok(ReportReason::InappropriateContent),
            "harassment" => Ok(ReportReason::Harassment),
            "fake-profile" => Ok(ReportReason::FakeProfile),
            "spam" => Ok(ReportReason::Spam),
            "other" => Ok(ReportReason::Other),
            other => Err(ParseEnumError::new("report reason", other)),
        }
    }
}

/// Validate a new report before it is stored.
pub fn validate_report(
    reporter_id: &str,
    reported_user_id: &str,
    details: &str,
) -> Result<(), ModerationError> {
    if reporter_id == reported_user_id {
        return Err(ModerationError::SelfReport);
    }
    if details.trim().chars().count() < REPORT_DETAILS_MIN_CHARS {
        return Err(ModerationError::TooShort {
            field: "details",
            min: REPORT_DETAILS_MIN_CHARS,
        });
    }
    Ok(())
}

pub fn validate_support_message(message: &str) -> Result<(), ModerationError> {
    if message.trim().chars().count() < SUPPORT_MESSAGE_MIN_CHARS {
        return Err(ModerationError::TooShort {
            field: "message",
            min: SUPPORT_MESSAGE_MIN_CHARS,
        });
    }
    Ok(())
}

/// Report review state. `Resolved` and `Dismissed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }

    pub fn transition(self, to: ReportStatus) -> Result<ReportStatus, ModerationError> {
        match (self, to) {
            (ReportStatus::Pending, ReportStatus::Resolved | ReportStatus::Dismissed) => Ok(to),
            _ => Err(ModerationError::InvalidTransition {
                kind: "report",
                from: self.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

impl FromStr for ReportStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            other => Err(ParseEnumError::new("report status", other)),
        }
    }
}

/// Support ticket state. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportStatus {
    Unread,
    InProgress,
    Resolved,
}

impl SupportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportStatus::Unread => "unread",
            SupportStatus::InProgress => "in-progress",
            SupportStatus::Resolved => "resolved",
        }
    }

    pub fn transition(self, to: SupportStatus) -> Result<SupportStatus, ModerationError> {
        if to > self {
            Ok(to)
        } else {
            Err(ModerationError::InvalidTransition {
                kind: "support ticket",
                from: self.as_str(),
                to: to.as_str(),
            })
        }
    }
}

impl FromStr for SupportStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unread" => Ok(SupportStatus::Unread),
            "in-progress" => Ok(SupportStatus::InProgress),
            "resolved" => Ok(SupportStatus::Resolved),
            other => Err(ParseEnumError::new("support status", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_suspension_lasts_six_months_then_reverts() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let outcome = apply_action(ModerationAction::Suspend, now);

        let until = match outcome {
            ModerationOutcome::Suspended { until } => until,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(until, Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap());

        assert_eq!(
            UserStatus::Suspended.effective(Some(until), until),
            UserStatus::NeedsGrowth
        );
        assert!(!has_full_access(UserStatus::Suspended, true));
    }

    #[test]
    fn test_warn_and_remove_outcomes() {
        let now = Utc::now();
        assert_eq!(apply_action(ModerationAction::Warn, now), ModerationOutcome::Warned);
        assert_eq!(apply_action(ModerationAction::Remove, now), ModerationOutcome::Removed);
    }

    #[test]
    fn test_report_transitions() {
        assert_eq!(
            ReportStatus::Pending.transition(ReportStatus::Dismissed),
            Ok(ReportStatus::Dismissed)
        );
        assert!(ReportStatus::Resolved.transition(ReportStatus::Dismissed).is_err());
        assert!(ReportStatus::Dismissed.transition(ReportStatus::Pending).is_err());
        assert!(ReportStatus::Pending.transition(ReportStatus::Pending).is_err());
    }

    #[test]
    fn test_support_moves_forward_only() {
        assert_eq!(
            SupportStatus::Unread.transition(SupportStatus::InProgress),
            Ok(SupportStatus::InProgress)
        );
        assert_eq!(
            SupportStatus::Unread.transition(SupportStatus::Resolved),
            Ok(SupportStatus::Resolved)
        );
        assert!(SupportStatus::Resolved.transition(SupportStatus::InProgress).is_err());
        assert!(SupportStatus::InProgress.transition(SupportStatus::InProgress).is_err());
    }

    #[test]
    fn test_report_validation() {
        assert_eq!(
            validate_report("u1", "u1", "this person is not who they say"),
            Err(ModerationError::SelfReport)
        );
        assert!(matches!(
            validate_report("u1", "u2", "rude"),
            Err(ModerationError::TooShort { .. })
        ));
        assert!(validate_report("u1", "u2", "Sent me abusive messages twice").is_ok());
        assert!(validate_support_message("help").is_err());
    }
}
