//! Scoring with negative marking.
//!
//! `score` is a pure function of the question set, the answers and the
//! marking scheme. It never reads the clock or any session state.

use serde::{Deserialize, Serialize};

use crate::model::{AnswerMap, OptionKey, QuestionId, QuestionSet};

/// How answers translate into marks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkingScheme {
    /// Marks awarded per correct answer.
    pub mark_per_question: f64,
    /// Marks deducted per wrong answer.
    pub negative_marking: f64,
    /// Minimum score to pass (inclusive).
    pub pass_mark: f64,
}

impl Default for MarkingScheme {
    fn default() -> Self {
        Self {
            mark_per_question: 1.25,
            negative_marking: 0.25,
            pass_mark: 40.0,
        }
    }
}

/// The graded result of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub correct: usize,
    pub wrong: usize,
    pub attempted: usize,
    /// Number of questions in the set.
    pub total: usize,
    /// Never negative.
    pub score: f64,
    /// Maximum achievable score.
    pub total_marks: f64,
    pub pass: bool,
}

impl ScoreReport {
    /// Share of attempted questions answered correctly, in percent.
    pub fn accuracy_percent(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempted as f64 * 100.0
        }
    }

    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.attempted)
    }
}

/// Grade `answers` against `questions`.
///
/// Unanswered questions count toward neither correct nor wrong. Answers for
/// IDs outside the set are ignored.
pub fn score(questions: &QuestionSet, answers: &AnswerMap, scheme: &MarkingScheme) -> ScoreReport {
    let mut correct = 0usize;
    let mut wrong = 0usize;

    for q in questions.iter() {
        match answers.get(&q.id) {
            Some(selected) if *selected == q.correct_option => correct += 1,
            Some(_) => wrong += 1,
            None => {}
        }
    }

    let raw = correct as f64 * scheme.mark_per_question - wrong as f64 * scheme.negative_marking;
    let score = raw.max(0.0);
    let total = questions.len();

    ScoreReport {
        correct,
        wrong,
        attempted: correct + wrong,
        total,
        score,
        total_marks: total as f64 * scheme.mark_per_question,
        pass: score >= scheme.pass_mark,
    }
}

/// Outcome of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Wrong,
    Unanswered,
}

/// Per-question review line shown after the exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReview {
    /// Zero-based position in the set.
    pub index: usize,
    pub question_id: QuestionId,
    pub selected: Option<OptionKey>,
    pub correct_option: OptionKey,
    pub verdict: Verdict,
}

/// One review line per question, in set order.
pub fn review(questions: &QuestionSet, answers: &AnswerMap) -> Vec<AnswerReview> {
    questions
        .iter()
        .enumerate()
        .map(|(index, q)| {
            let selected = answers.get(&q.id).cloned();
            let verdict = match &selected {
                None => Verdict::Unanswered,
                Some(s) if *s == q.correct_option => Verdict::Correct,
                Some(_) => Verdict::Wrong,
            };
            AnswerReview {
                index,
                question_id: q.id.clone(),
                selected,
                correct_option: q.correct_option.clone(),
                verdict,
            }
        })
        .collect()
}
