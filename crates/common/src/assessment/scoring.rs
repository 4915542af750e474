//! # Scoring & Placement
//!
//! `calculate_assessment_result` is a pure function of the answers and the
//! catalog (for category lookup). It never reads the clock or any store.

use std::collections::BTreeMap;

use super::{
    AssessmentAnswer, AssessmentCatalog, AssessmentError, AssessmentResult, Category,
    FLAG_MULTIPLE_CONCERNS, FLAG_SIGNIFICANT_GROWTH, GROWTH_AREA_THRESHOLD, MAX_OPTION_SCORE,
    PASS_THRESHOLD, RED_FLAG_LIMIT, SIGNIFICANT_GROWTH_THRESHOLD,
};
use crate::user::UserStatus;

/// Score a completed set of answers.
///
/// Returns [`AssessmentError::NoAnswers`] for an empty slice instead of
/// producing an undefined percentage.
pub fn calculate_assessment_result(
    answers: &[AssessmentAnswer],
    catalog: &AssessmentCatalog,
) -> Result<AssessmentResult, AssessmentError> {
    if answers.is_empty() {
        return Err(AssessmentError::NoAnswers);
    }

    // Scores above the per-option maximum are clamped so the percentage stays in range
    let score_of = |a: &AssessmentAnswer| u32::from(a.score.min(MAX_OPTION_SCORE));

    let total_score: u32 = answers.iter().map(score_of).sum();
    let max_possible = answers.len() as u32 * u32::from(MAX_OPTION_SCORE);
    let percentage = rounded_percent(total_score, max_possible);
    let red_flag_count = answers.iter().filter(|a| a.red_flag).count();

    let passed = percentage >= PASS_THRESHOLD && red_flag_count < RED_FLAG_LIMIT;

    // (sum, count) per category
    let mut totals: BTreeMap<Category, (u32, u32)> = BTreeMap::new();
    for answer in answers {
        if let Some(category) = catalog.category_of(&answer.question_id) {
            let entry = totals.entry(category).or_insert((0, 0));
            entry.0 += score_of(answer);
            entry.1 += 1;
        }
    }

    let category_scores: BTreeMap<Category, u8> = totals
        .into_iter()
        .map(|(category, (sum, count))| {
            (category, rounded_percent(sum, count * u32::from(MAX_OPTION_SCORE)))
        })
        .collect();

    let growth_areas = Category::ALL
        .iter()
        .filter(|c| {
            category_scores
                .get(c)
                .is_some_and(|score| *score < GROWTH_AREA_THRESHOLD)
        })
        .map(|c| c.label().to_string())
        .collect();

    let mut integrity_flags = Vec::new();
    if red_flag_count >= RED_FLAG_LIMIT {
        integrity_flags.push(FLAG_MULTIPLE_CONCERNS.to_string());
    }
    if percentage < SIGNIFICANT_GROWTH_THRESHOLD {
        integrity_flags.push(FLAG_SIGNIFICANT_GROWTH.to_string());
    }

    tracing::debug!(
        total_score,
        percentage,
        red_flag_count,
        passed,
        "Assessment scored"
    );

    Ok(AssessmentResult {
        total_score,
        percentage,
        passed,
        category_scores,
        integrity_flags,
        growth_areas,
        red_flag_count,
    })
}

/// Status a user is placed in after an attempt.
pub fn placement_for(result: &AssessmentResult) -> UserStatus {
    if result.passed {
        UserStatus::Active
    } else {
        UserStatus::NeedsGrowth
    }
}

/// Round-half-up integer percentage; `max` must be non-zero.
fn rounded_percent(value: u32, max: u32) -> u8 {
    let percent = (f64::from(value) / f64::from(max) * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}
