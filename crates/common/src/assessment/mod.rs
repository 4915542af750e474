//! # Assessment
//!
//! The gate every new member passes before browsing. A fixed question bank is
//! answered through an [`AssessmentSession`], scored by
//! [`calculate_assessment_result`] and turned into a placement.
//!
//! ## Table of Contents
//! - **catalog**: question bank and follow-up set
//! - **scoring**: pure scoring and placement
//! - **session**: answering flow with one-shot follow-up escalation
//! - **retake**: cooldown between attempts
//! - **growth**: Growth Mode guidance for weak categories

pub mod catalog;
pub mod growth;
pub mod retake;
pub mod scoring;
pub mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::ParseEnumError;

pub use catalog::{AnswerOption, AssessmentCatalog, Question};
pub use growth::{growth_plan, GrowthRecommendation};
pub use retake::{can_retake, check_attempt_allowed, next_retake_at, RETAKE_COOLDOWN_MONTHS};
pub use scoring::{calculate_assessment_result, placement_for};
pub use session::{AssessmentSession, SessionPhase};

/// Highest score any single option can carry.
pub const MAX_OPTION_SCORE: u8 = 10;
/// Minimum overall percentage needed to pass.
pub const PASS_THRESHOLD: u8 = 78;
/// Red flag count at which an otherwise passing score fails.
pub const RED_FLAG_LIMIT: usize = 3;
/// Red flags during the primary set that trigger the follow-up questions.
pub const FOLLOW_UP_TRIGGER: usize = 2;
/// Category percentage below which it is reported as a growth area.
pub const GROWTH_AREA_THRESHOLD: u8 = 70;
/// Overall percentage below which the result carries an integrity flag.
pub const SIGNIFICANT_GROWTH_THRESHOLD: u8 = 60;

pub const FLAG_MULTIPLE_CONCERNS: &str = "Multiple concerning responses detected";
pub const FLAG_SIGNIFICANT_GROWTH: &str = "Significant growth areas identified";

/// Behavioural dimension a question measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    EmotionalRegulation,
    Accountability,
    Autonomy,
    Boundaries,
    ConflictRepair,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::EmotionalRegulation,
        Category::Accountability,
        Category::Autonomy,
        Category::Boundaries,
        Category::ConflictRepair,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::EmotionalRegulation => "emotional-regulation",
            Category::Accountability => "accountability",
            Category::Autonomy => "autonomy",
            Category::Boundaries => "boundaries",
            Category::ConflictRepair => "conflict-repair",
        }
    }

    /// Human readable name used in growth area lists.
    pub fn label(&self) -> &'static str {
        match self {
            Category::EmotionalRegulation => "Emotional Regulation",
            Category::Accountability => "Accountability",
            Category::Autonomy => "Autonomy",
            Category::Boundaries => "Boundaries",
            Category::ConflictRepair => "Conflict Repair",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("category", s))
    }
}

/// One scored response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentAnswer {
    pub question_id: String,
    pub score: u8,
    #[serde(default)]
    pub red_flag: bool,
}

impl AssessmentAnswer {
    pub fn new(question_id: impl Into<String>, score: u8, red_flag: bool) -> Self {
        Self {
            question_id: question_id.into(),
            score,
            red_flag,
        }
    }
}

/// Outcome of a completed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub total_score: u32,
    pub percentage: u8,
    pub passed: bool,
    pub category_scores: BTreeMap<Category, u8>,
    pub integrity_flags: Vec<String>,
    pub growth_areas: Vec<String>,
    pub red_flag_count: usize,
}

/// Assessment failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentError {
    #[error("no answers were submitted")]
    NoAnswers,

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("unknown option {option_id} for question {question_id}")]
    UnknownOption {
        question_id: String,
        option_id: String,
    },

    #[error("expected an answer to {expected}, got {got}")]
    UnexpectedQuestion { expected: String, got: String },

    #[error("assessment is already complete")]
    AlreadyComplete,

    #[error("assessment is incomplete: {remaining} question(s) unanswered")]
    Incomplete { remaining: usize },

    #[error("assessment can be retaken after {eligible_at}")]
    RetakeLocked { eligible_at: DateTime<Utc> },

    #[error("the assessment is unavailable while the account is suspended")]
    Suspended { until: Option<DateTime<Utc>> },
}
