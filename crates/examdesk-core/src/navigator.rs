//! Sequential traversal of the question set and answer recording.

use crate::error::SessionError;
use crate::model::{AnswerMap, OptionKey, Question, QuestionId, QuestionSet};

/// Tracks the current question and the candidate's answers.
///
/// `current_index` always stays inside `[0, len - 1]` for a non-empty set.
#[derive(Debug, Clone)]
pub struct Navigator {
    questions: QuestionSet,
    current_index: usize,
    answers: AnswerMap,
}

impl Navigator {
    pub fn new(questions: QuestionSet) -> Self {
        Self {
            questions,
            current_index: 0,
            answers: AnswerMap::new(),
        }
    }

    /// Resume at a saved position with saved answers.
    ///
    /// The index is clamped and answers the set does not accept are dropped.
    pub fn resume(questions: QuestionSet, current_index: usize, mut answers: AnswerMap) -> Self {
        answers.retain_valid(&questions);
        let current_index = current_index.min(questions.len().saturating_sub(1));
        Self {
            questions,
            current_index,
            answers,
        }
    }

    /// Move by `delta`. A move that would leave the set is a no-op.
    ///
    /// Returns `true` if the index changed.
    pub fn go_to(&mut self, delta: i64) -> bool {
        if delta == 0 || self.questions.is_empty() {
            return false;
        }
        let Some(target) = (self.current_index as i64).checked_add(delta) else {
            return false;
        };
        if target < 0 || target >= self.questions.len() as i64 {
            return false;
        }
        self.current_index = target as usize;
        true
    }

    pub fn next(&mut self) -> bool {
        self.go_to(1)
    }

    pub fn previous(&mut self) -> bool {
        self.go_to(-1)
    }

    /// Upsert the answer for `question`.
    pub fn record_answer(
        &mut self,
        question: &QuestionId,
        option: &OptionKey,
    ) -> Result<(), SessionError> {
        let q = self
            .questions
            .find(question)
            .ok_or_else(|| SessionError::UnknownQuestion(question.clone()))?;
        if !q.has_option(option) {
            return Err(SessionError::UnknownOption {
                question: question.clone(),
                option: option.clone(),
            });
        }
        self.answers.record(question.clone(), option.clone());
        Ok(())
    }

    /// The question at `current_index`, or `None` for an empty set.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_first(&self) -> bool {
        self.current_index == 0
    }

    pub fn is_last(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }
}
