//! # User Enums
//!
//! Status values stored on the user record. They serialize as the kebab-case
//! strings the database and the web client use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ParseEnumError;

/// Moderation/placement status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserStatus {
    /// Passed the assessment, full access
    Active,
    /// Suspended by an admin until `suspension_end_date`
    Suspended,
    /// Growth Mode: not (yet) passed, or returning from a suspension
    NeedsGrowth,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
            UserStatus::NeedsGrowth => "needs-growth",
        }
    }

    /// Status as seen at `now`. An elapsed suspension reverts to Growth Mode.
    pub fn effective(
        self,
        suspension_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> UserStatus {
        match (self, suspension_end) {
            (UserStatus::Suspended, Some(end)) if now >= end => UserStatus::NeedsGrowth,
            (status, _) => status,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "suspended" => Ok(UserStatus::Suspended),
            "needs-growth" => Ok(UserStatus::NeedsGrowth),
            other => Err(ParseEnumError::new("user status", other)),
        }
    }
}

/// Paid membership plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MembershipTier {
    Monthly,
    Quarterly,
    Annual,
}

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Monthly => "monthly",
            MembershipTier::Quarterly => "quarterly",
            MembershipTier::Annual => "annual",
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(MembershipTier::Monthly),
            "quarterly" => Ok(MembershipTier::Quarterly),
            "annual" => Ok(MembershipTier::Annual),
            other => Err(ParseEnumError::new("membership tier", other)),
        }
    }
}

/// Third-party background check progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundCheckStatus {
    NotStarted,
    Pending,
    Cleared,
    Flagged,
}

impl BackgroundCheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundCheckStatus::NotStarted => "not-started",
            BackgroundCheckStatus::Pending => "pending",
            BackgroundCheckStatus::Cleared => "cleared",
            BackgroundCheckStatus::Flagged => "flagged",
        }
    }
}

impl fmt::Display for BackgroundCheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundCheckStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-started" => Ok(BackgroundCheckStatus::NotStarted),
            "pending" => Ok(BackgroundCheckStatus::Pending),
            "cleared" => Ok(BackgroundCheckStatus::Cleared),
            "flagged" => Ok(BackgroundCheckStatus::Flagged),
            other => Err(ParseEnumError::new("background check status", other)),
        }
    }
}
