//! # Growth Mode
//!
//! Guidance handed to members who did not pass, one entry per weak category.

use serde::Serialize;

use super::{AssessmentResult, Category, GROWTH_AREA_THRESHOLD};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrowthRecommendation {
    pub category: Category,
    pub label: &'static str,
    pub score: u8,
    pub focus: &'static str,
    pub practices: &'static [&'static str],
}

/// Recommendations for every category that scored below the growth threshold,
/// weakest first.
pub fn growth_plan(result: &AssessmentResult) -> Vec<GrowthRecommendation> {
    let mut plan: Vec<GrowthRecommendation> = result
        .category_scores
        .iter()
        .filter(|(_, score)| **score < GROWTH_AREA_THRESHOLD)
        .map(|(category, score)| {
            let (focus, practices) = guidance(*category);
            GrowthRecommendation {
                category: *category,
                label: category.label(),
                score: *score,
                focus,
                practices,
            }
        })
        .collect();
    plan.sort_by_key(|r| r.score);
    plan
}

fn guidance(category: Category) -> (&'static str, &'static [&'static str]) {
    match category {
        Category::EmotionalRegulation => (
            "Noticing strong feelings early and responding instead of reacting.",
            &[
                "Keep a short daily log of what triggered strong emotions and how you responded.",
                "Practise asking for a timed pause during tense conversations.",
                "Try a breathing or grounding exercise before replying to upsetting messages.",
            ],
        ),
        Category::Accountability => (
            "Owning your part without deflecting or over-explaining.",
            &[
                "Write an apology for a recent mistake that contains no explanation or excuse.",
                "List two patterns from past relationships that you contributed to.",
                "Ask a trusted friend how you tend to respond to criticism.",
            ],
        ),
        Category::Autonomy => (
            "Keeping a full life of your own alongside a relationship.",
            &[
                "Schedule one activity a week that is only for you.",
                "Reconnect with a friend you lost touch with while dating.",
                "Notice when you feel uneasy about a partner's independent plans and name why.",
            ],
        ),
        Category::Boundaries => (
            "Hearing and respecting a no, and stating your own limits clearly.",
            &[
                "Practise accepting a no without asking for reasons.",
                "Write down three of your own limits and how you would state them.",
                "Reflect on a time you pushed past someone's boundary and what it cost.",
            ],
        ),
        Category::ConflictRepair => (
            "Coming back together after disagreement instead of avoiding or winning.",
            &[
                "After your next disagreement, initiate a check-in within a day.",
                "Practise describing the need behind a complaint rather than the complaint itself.",
                "Leave past grievances out of current arguments.",
            ],
        ),
    }
}
