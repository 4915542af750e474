//! # Question Catalog
//!
//! The static question bank. Option scores are never sent to clients; the
//! server resolves `(question_id, option_id)` pairs against this table.

use serde::Serialize;

use super::{AssessmentAnswer, AssessmentError, Category};

/// A selectable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOption {
    pub id: &'static str,
    pub text: &'static str,
    pub score: u8,
    pub red_flag: bool,
}

/// A single assessment question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub category: Category,
    pub prompt: &'static str,
    pub options: &'static [AnswerOption],
}

impl Question {
    pub fn option(&self, option_id: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Resolve an option into a scored answer.
    pub fn answer(&self, option_id: &str) -> Result<AssessmentAnswer, AssessmentError> {
        let option = self.option(option_id).ok_or_else(|| AssessmentError::UnknownOption {
            question_id: self.id.to_string(),
            option_id: option_id.to_string(),
        })?;
        Ok(AssessmentAnswer::new(self.id, option.score, option.red_flag))
    }

    /// Client-facing view with scores and red flags stripped.
    pub fn public_view(&self) -> QuestionView {
        QuestionView {
            id: self.id,
            category: self.category,
            prompt: self.prompt,
            options: self
                .options
                .iter()
                .map(|o| OptionView { id: o.id, text: o.text })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: &'static str,
    pub category: Category,
    pub prompt: &'static str,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: &'static str,
    pub text: &'static str,
}

/// Primary questions plus the follow-up set used on escalation.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentCatalog {
    primary: &'static [Question],
    follow_up: &'static [Question],
}

impl Default for AssessmentCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl AssessmentCatalog {
    pub const fn new(primary: &'static [Question], follow_up: &'static [Question]) -> Self {
        Self { primary, follow_up }
    }

    /// The production question bank.
    pub const fn standard() -> Self {
        Self::new(PRIMARY_QUESTIONS, FOLLOW_UP_QUESTIONS)
    }

    pub fn primary(&self) -> &'static [Question] {
        self.primary
    }

    pub fn follow_up(&self) -> &'static [Question] {
        self.follow_up
    }

    pub fn find(&self, question_id: &str) -> Option<&'static Question> {
        self.primary
            .iter()
            .chain(self.follow_up.iter())
            .find(|q| q.id == question_id)
    }

    pub fn category_of(&self, question_id: &str) -> Option<Category> {
        self.find(question_id).map(|q| q.category)
    }
}

const fn opt(id: &'static str, text: &'static str, score: u8, red_flag: bool) -> AnswerOption {
    AnswerOption {
        id,
        text,
        score,
        red_flag,
    }
}

const PRIMARY_QUESTIONS: &[Question] = &[
    Question {
        id: "er-1",
        category: Category::EmotionalRegulation,
        prompt: "Your partner cancels plans you were looking forward to. What happens next?",
        options: &[
            opt("a", "I notice the disappointment, say so calmly, and we reschedule.", 10, false),
            opt("b", "I feel let down and need a little time before I can talk about it.", 7, false),
            opt("c", "I go quiet for the rest of the day and hope they pick up on it.", 3, false),
            opt("d", "I tell them they clearly don't care and ignore their messages.", 0, true),
        ],
    },
    Question {
        id: "er-2",
        category: Category::EmotionalRegulation,
        prompt: "When you feel overwhelmed during a heated conversation, you usually:",
        options: &[
            opt("a", "Name it and ask for a short break with a time to come back.", 10, false),
            opt("b", "Push through, even though I may say things less carefully.", 6, false),
            opt("c", "Leave without explaining and return when I feel like it.", 3, false),
            opt("d", "Raise my voice until the other person backs down.", 0, true),
        ],
    },
    Question {
        id: "er-3",
        category: Category::EmotionalRegulation,
        prompt: "A date doesn't text back for a day. How do you handle the wait?",
        options: &[
            opt("a", "I get on with my day; people are busy.", 10, false),
            opt("b", "I feel a bit anxious but wait before reaching out again.", 7, false),
            opt("c", "I send several follow-ups asking if something is wrong.", 3, false),
            opt("d", "I check their social media and confront them about what I find.", 0, true),
        ],
    },
    Question {
        id: "acc-1",
        category: Category::Accountability,
        prompt: "You forgot something important your partner asked you to do. You:",
        options: &[
            opt("a", "Own it, apologise without excuses, and fix what I can.", 10, false),
            opt("b", "Apologise, then explain why it slipped my mind.", 7, false),
            opt("c", "Point out that they forget things too.", 3, false),
            opt("d", "Insist they never actually asked me.", 0, true),
        ],
    },
    Question {
        id: "acc-2",
        category: Category::Accountability,
        prompt: "Thinking about your last relationship ending, which is closest?",
        options: &[
            opt("a", "I can name specific things I'd do differently.", 10, false),
            opt("b", "It was mostly mutual; we both made mistakes.", 8, false),
            opt("c", "Honestly, it was mostly their fault.", 3, false),
            opt("d", "Every one of my exes has been the problem.", 0, true),
        ],
    },
    Question {
        id: "acc-3",
        category: Category::Accountability,
        prompt: "A friend tells you a comment you made hurt them. Your first response is:",
        options: &[
            opt("a", "Thank them for telling me and ask what landed badly.", 10, false),
            opt("b", "Apologise, though I don't fully understand why.", 7, false),
            opt("c", "Explain what I really meant so they see it differently.", 4, false),
            opt("d", "Tell them they're being too sensitive.", 0, true),
        ],
    },
    Question {
        id: "aut-1",
        category: Category::Autonomy,
        prompt: "Your partner wants a weekend away with their own friends. You:",
        options: &[
            opt("a", "Encourage it; time apart is healthy.", 10, false),
            opt("b", "Feel a little left out but tell them to have fun.", 7, false),
            opt("c", "Ask them to check in with me every few hours.", 3, false),
            opt("d", "Ask them not to go; a couple should spend weekends together.", 0, true),
        ],
    },
    Question {
        id: "aut-2",
        category: Category::Autonomy,
        prompt: "How much of your social life exists outside of a relationship?",
        options: &[
            opt("a", "Plenty; my friendships and hobbies continue as before.", 10, false),
            opt("b", "Some, though it shrinks when I'm dating someone.", 6, false),
            opt("c", "Very little; my partner becomes my whole world.", 2, false),
            opt("d", "I expect my partner to drop friends I don't like.", 0, true),
        ],
    },
    Question {
        id: "bnd-1",
        category: Category::Boundaries,
        prompt: "Someone you're dating says they're not ready to meet your family yet. You:",
        options: &[
            opt("a", "Respect it and let them set the pace.", 10, false),
            opt("b", "Ask what would help them feel ready.", 8, false),
            opt("c", "Keep bringing it up until they agree.", 2, false),
            opt("d", "Invite my family over anyway as a surprise.", 0, true),
        ],
    },
    Question {
        id: "bnd-2",
        category: Category::Boundaries,
        prompt: "What do you think about sharing phone passwords in a relationship?",
        options: &[
            opt("a", "It's each person's choice; privacy isn't the same as secrecy.", 10, false),
            opt("b", "Fine if both people want to, never as a requirement.", 8, false),
            opt("c", "I'd feel uneasy if they didn't share theirs.", 3, false),
            opt("d", "I'd check their phone if I suspected something.", 0, true),
        ],
    },
    Question {
        id: "cr-1",
        category: Category::ConflictRepair,
        prompt: "After an argument, how do you usually reconnect?",
        options: &[
            opt("a", "Come back, talk about what happened, and agree on next steps.", 10, false),
            opt("b", "Let things cool off, then check in with a small gesture.", 7, false),
            opt("c", "Act as if nothing happened and move on.", 3, false),
            opt("d", "Wait for them to apologise first, however long it takes.", 0, true),
        ],
    },
    Question {
        id: "cr-2",
        category: Category::ConflictRepair,
        prompt: "The same disagreement keeps coming back. You:",
        options: &[
            opt("a", "Suggest we look for the underlying need behind it.", 10, false),
            opt("b", "Try to compromise a bit more each time.", 7, false),
            opt("c", "Avoid the subject so it doesn't come up.", 3, false),
            opt("d", "Bring up their past mistakes to win the argument.", 0, true),
        ],
    },
];

const FOLLOW_UP_QUESTIONS: &[Question] = &[
    Question {
        id: "fu-1",
        category: Category::EmotionalRegulation,
        prompt: "When you're angry with a partner, have you ever broken things, blocked a doorway, or made threats?",
        options: &[
            opt("a", "Never.", 10, false),
            opt("b", "Not physically, but I've said things I deeply regret.", 5, false),
            opt("c", "Once or twice, and I've worked on it since.", 2, false),
            opt("d", "Yes, when they push me far enough.", 0, true),
        ],
    },
    Question {
        id: "fu-2",
        category: Category::Boundaries,
        prompt: "If a partner says no to something you want, how do you respond?",
        options: &[
            opt("a", "Accept it; no is a complete answer.", 10, false),
            opt("b", "Ask once to understand, then drop it.", 8, false),
            opt("c", "Feel rejected and withdraw for a while.", 3, false),
            opt("d", "Keep asking until they change their mind.", 0, true),
        ],
    },
    Question {
        id: "fu-3",
        category: Category::ConflictRepair,
        prompt: "How would a past partner describe the way conflicts ended with you?",
        options: &[
            opt("a", "We talked it through and both felt heard.", 10, false),
            opt("b", "It took time, but we usually got there.", 7, false),
            opt("c", "Things were left unresolved more often than not.", 3, false),
            opt("d", "They gave in because it wasn't worth fighting me.", 0, true),
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::MAX_OPTION_SCORE;
    use std::collections::HashSet;

    #[test]
    fn test_standard_catalog_shape() {
        let catalog = AssessmentCatalog::standard();
        assert_eq!(catalog.primary().len(), 12);
        assert_eq!(catalog.follow_up().len(), 3);

        let ids: HashSet<_> = catalog
            .primary()
            .iter()
            .chain(catalog.follow_up())
            .map(|q| q.id)
            .collect();
        assert_eq!(ids.len(), 15, "question ids must be unique");
    }

    #[test]
    fn test_every_category_is_covered_and_scores_in_range() {
        let catalog = AssessmentCatalog::standard();
        for category in Category::ALL {
            assert!(catalog.primary().iter().any(|q| q.category == category));
        }
        for question in catalog.primary().iter().chain(catalog.follow_up()) {
            assert!(question.options.iter().all(|o| o.score <= MAX_OPTION_SCORE));
            assert!(question.options.iter().any(|o| o.score == MAX_OPTION_SCORE));
            assert!(question.options.iter().any(|o| o.red_flag));
        }
    }

    #[test]
    fn test_answer_resolution() {
        let catalog = AssessmentCatalog::standard();
        let question = catalog.find("bnd-2").unwrap();

        let answer = question.answer("d").unwrap();
        assert_eq!(answer, AssessmentAnswer::new("bnd-2", 0, true));

        let err = question.answer("z").unwrap_err();
        assert!(matches!(err, AssessmentError::UnknownOption { .. }));
        assert_eq!(catalog.category_of("fu-2"), Some(Category::Boundaries));
        assert_eq!(catalog.category_of("nope"), None);
    }

    #[test]
    fn test_public_view_hides_scores() {
        let catalog = AssessmentCatalog::standard();
        let json = serde_json::to_value(catalog.primary()[0].public_view()).unwrap();
        let option = &json["options"][0];
        assert!(option.get("score").is_none());
        assert!(option.get("red_flag").is_none());
        assert_eq!(json["category"], "emotional-regulation");
    }
}
