//! # Retake Gating
//!
//! One attempt per six calendar months.

use chrono::{DateTime, Months, Utc};

use super::AssessmentError;
use crate::user::UserStatus;

pub const RETAKE_COOLDOWN_MONTHS: u32 = 6;

/// Earliest moment a new attempt is allowed after `last_attempt`.
pub fn next_retake_at(last_attempt: DateTime<Utc>) -> DateTime<Utc> {
    last_attempt
        .checked_add_months(Months::new(RETAKE_COOLDOWN_MONTHS))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Check whether an attempt may start at `now`.
pub fn can_retake(
    last_attempt: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), AssessmentError> {
    match last_attempt {
        Some(last) => {
            let eligible_at = next_retake_at(last);
            if now >= eligible_at {
                Ok(())
            } else {
                Err(AssessmentError::RetakeLocked { eligible_at })
            }
        }
        None => Ok(()),
    }
}

/// Check a member's standing before scoring a new attempt.
///
/// A running suspension blocks the assessment outright; once it has elapsed
/// only the cooldown applies.
pub fn check_attempt_allowed(
    status: UserStatus,
    suspension_end: Option<DateTime<Utc>>,
    last_attempt: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), AssessmentError> {
    if status.effective(suspension_end, now) == UserStatus::Suspended {
        return Err(AssessmentError::Suspended {
            until: suspension_end,
        });
    }
    can_retake(last_attempt, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_first_attempt_always_allowed() {
        assert!(can_retake(None, Utc::now()).is_ok());
    }

    #[test]
    fn test_cooldown_is_six_calendar_months() {
        let last = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let eligible = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();

        assert_eq!(next_retake_at(last), eligible);
        assert!(can_retake(Some(last), eligible).is_ok());

        let err = can_retake(Some(last), eligible - Duration::seconds(1)).unwrap_err();
        assert_eq!(err, AssessmentError::RetakeLocked { eligible_at: eligible });
    }

    #[test]
    fn test_suspension_blocks_attempt() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let until = now + Duration::days(30);

        let err = check_attempt_allowed(UserStatus::Suspended, Some(until), None, now).unwrap_err();
        assert_eq!(err, AssessmentError::Suspended { until: Some(until) });

        // Elapsed suspension: only the cooldown is left to check
        assert!(check_attempt_allowed(UserStatus::Suspended, Some(now), None, now).is_ok());

        let last = now - Duration::days(10);
        assert!(matches!(
            check_attempt_allowed(UserStatus::NeedsGrowth, None, Some(last), now),
            Err(AssessmentError::RetakeLocked { .. })
        ));
    }

    #[test]
    fn test_month_end_clamps() {
        let last = Utc.with_ymd_and_hms(2025, 8, 31, 0, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap();
        assert_eq!(next_retake_at(last), expected);
    }
}
