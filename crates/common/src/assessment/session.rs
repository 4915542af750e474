//! # Assessment Session
//!
//! Walks a user through the primary questions. As soon as two red-flag
//! answers have been given in the primary set, the session detours through
//! the follow-up questions once, then resumes where it left off. Follow-up
//! answers are scored together with the primary ones.

use serde::Serialize;

use super::{
    calculate_assessment_result, AssessmentAnswer, AssessmentCatalog, AssessmentError,
    AssessmentResult, Question, FOLLOW_UP_TRIGGER,
};

/// Which part of the question bank the session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Primary,
    FollowUp,
    Complete,
}

/// In-progress assessment attempt.
#[derive(Debug, Clone)]
pub struct AssessmentSession {
    catalog: AssessmentCatalog,
    answers: Vec<AssessmentAnswer>,
    phase: SessionPhase,
    primary_index: usize,
    follow_up_index: usize,
    escalated: bool,
}

impl AssessmentSession {
    pub fn new(catalog: AssessmentCatalog) -> Self {
        let phase = if catalog.primary().is_empty() {
            SessionPhase::Complete
        } else {
            SessionPhase::Primary
        };
        Self {
            catalog,
            answers: Vec::new(),
            phase,
            primary_index: 0,
            follow_up_index: 0,
            escalated: false,
        }
    }

    /// Replay a full submission of `(question_id, option_id)` pairs and score it.
    pub fn replay<'a, I>(catalog: AssessmentCatalog, responses: I) -> Result<AssessmentResult, AssessmentError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut session = Self::new(catalog);
        for (question_id, option_id) in responses {
            session.answer_question(question_id, option_id)?;
        }
        session.finish()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn answers(&self) -> &[AssessmentAnswer] {
        &self.answers
    }

    /// Whether the follow-up set has been (or is being) asked.
    pub fn escalated(&self) -> bool {
        self.escalated
    }

    pub fn red_flag_count(&self) -> usize {
        self.answers.iter().filter(|a| a.red_flag).count()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    /// The question waiting for an answer.
    pub fn current_question(&self) -> Option<&'static Question> {
        match self.phase {
            SessionPhase::Primary => self.catalog.primary().get(self.primary_index),
            SessionPhase::FollowUp => self.catalog.follow_up().get(self.follow_up_index),
            SessionPhase::Complete => None,
        }
    }

    /// Questions still to be answered on the current path.
    pub fn remaining(&self) -> usize {
        let primary_left = self.catalog.primary().len() - self.primary_index;
        match self.phase {
            SessionPhase::Primary => primary_left,
            SessionPhase::FollowUp => {
                primary_left + self.catalog.follow_up().len() - self.follow_up_index
            }
            SessionPhase::Complete => 0,
        }
    }

    /// Answer the current question, checking the caller answered the one asked.
    pub fn answer_question(&mut self, question_id: &str, option_id: &str) -> Result<(), AssessmentError> {
        let question = self.current_question().ok_or(AssessmentError::AlreadyComplete)?;
        if question.id != question_id {
            return Err(if self.catalog.find(question_id).is_some() {
                AssessmentError::UnexpectedQuestion {
                    expected: question.id.to_string(),
                    got: question_id.to_string(),
                }
            } else {
                AssessmentError::UnknownQuestion(question_id.to_string())
            });
        }
        self.answer(option_id)
    }

    /// Answer the current question with the given option.
    pub fn answer(&mut self, option_id: &str) -> Result<(), AssessmentError> {
        let question = self.current_question().ok_or(AssessmentError::AlreadyComplete)?;
        let answer = question.answer(option_id)?;
        self.answers.push(answer);
        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        let primary_len = self.catalog.primary().len();
        match self.phase {
            SessionPhase::Primary => {
                self.primary_index += 1;
                if !self.escalated
                    && self.red_flag_count() >= FOLLOW_UP_TRIGGER
                    && !self.catalog.follow_up().is_empty()
                {
                    tracing::debug!(after = self.primary_index, "Escalating to follow-up questions");
                    self.escalated = true;
                    self.phase = SessionPhase::FollowUp;
                } else if self.primary_index >= primary_len {
                    self.phase = SessionPhase::Complete;
                }
            }
            SessionPhase::FollowUp => {
                self.follow_up_index += 1;
                if self.follow_up_index >= self.catalog.follow_up().len() {
                    self.phase = if self.primary_index < primary_len {
                        SessionPhase::Primary
                    } else {
                        SessionPhase::Complete
                    };
                }
            }
            SessionPhase::Complete => {}
        }
    }

    /// Score the attempt. Fails if questions are still outstanding.
    pub fn finish(&self) -> Result<AssessmentResult, AssessmentError> {
        if !self.is_complete() {
            return Err(AssessmentError::Incomplete {
                remaining: self.remaining(),
            });
        }
        calculate_assessment_result(&self.answers, &self.catalog)
    }
}
