//! Core data model types for examdesk.
//!
//! Questions are immutable once loaded; the set order is the navigation order.
//! Answers are keyed by question ID and only ever hold answered questions.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StartupError;

/// Identifier of a question within a set.
///
/// Question files in the wild use both integer and string IDs, so both are
/// accepted on input. The canonical form is always a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for QuestionId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for QuestionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = QuestionId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer question id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(QuestionId(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(QuestionId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(QuestionId(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(QuestionId(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Key of an answer option (e.g. `"a"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionKey(String);

impl OptionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// The question text.
    #[serde(rename = "question")]
    pub prompt: String,
    /// Option key to option text, ordered by key.
    pub options: BTreeMap<OptionKey, String>,
    #[serde(rename = "correctAnswer")]
    pub correct_option: OptionKey,
}

impl Question {
    pub fn has_option(&self, key: &OptionKey) -> bool {
        self.options.contains_key(key)
    }
}

/// An ordered, duplicate-free set of questions.
///
/// May be empty at the type level; the session controller refuses to start
/// on an empty set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

impl QuestionSet {
    /// Build a set, rejecting duplicate IDs.
    pub fn new(questions: Vec<Question>) -> Result<Self, StartupError> {
        let mut seen = HashSet::new();
        for q in &questions {
            if !seen.insert(&q.id) {
                return Err(StartupError::DuplicateQuestion(q.id.clone()));
            }
        }
        Ok(Self { questions })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn find(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    pub fn position(&self, id: &QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| &q.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// Returns `true` if `option` is a valid answer key for question `id`.
    pub fn accepts(&self, id: &QuestionId, option: &OptionKey) -> bool {
        self.find(id).is_some_and(|q| q.has_option(option))
    }
}

/// Question ID to selected option. Absence means unanswered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<QuestionId, OptionKey>);

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the selection for a question.
    pub fn record(&mut self, question: QuestionId, option: OptionKey) {
        self.0.insert(question, option);
    }

    pub fn get(&self, question: &QuestionId) -> Option<&OptionKey> {
        self.0.get(question)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &OptionKey)> {
        self.0.iter()
    }

    /// Drop every entry that is not a valid (question, option) pair in `questions`.
    pub fn retain_valid(&mut self, questions: &QuestionSet) {
        self.0.retain(|id, option| questions.accepts(id, option));
    }
}

impl FromIterator<(QuestionId, OptionKey)> for AnswerMap {
    fn from_iter<T: IntoIterator<Item = (QuestionId, OptionKey)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The persisted unit of a running exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(alias = "studentName")]
    pub candidate_id: String,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub answers: AnswerMap,
    /// Missing in some older saves; restores then get the full duration.
    #[serde(alias = "timeLeft", default = "unknown_remaining")]
    pub remaining_seconds: u64,
}

fn unknown_remaining() -> u64 {
    u64::MAX
}

impl SessionState {
    /// A brand-new session at the first question with the full duration.
    pub fn fresh(candidate_id: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            current_index: 0,
            answers: AnswerMap::new(),
            remaining_seconds: duration_secs,
        }
    }

    /// Make a restored state consistent with the loaded question set.
    ///
    /// Clamps the index into the set, drops answers the set does not accept
    /// and caps the remaining time at the configured duration.
    pub fn reconcile(mut self, questions: &QuestionSet, duration_secs: u64) -> Self {
        self.current_index = self.current_index.min(questions.len().saturating_sub(1));
        self.answers.retain_valid(questions);
        self.remaining_seconds = self.remaining_seconds.min(duration_secs);
        self
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A question with options a-d and the given correct key.
    pub fn question(id: &str, correct: &str) -> Question {
        Question {
            id: QuestionId::from(id),
            prompt: format!("Question {id}"),
            options: ["a", "b", "c", "d"]
                .into_iter()
                .map(|k| (OptionKey::from(k), format!("option {k}")))
                .collect(),
            correct_option: OptionKey::from(correct),
        }
    }

    /// `n` questions with IDs `1..=n`, all answered correctly by `a`.
    pub fn question_set(n: usize) -> QuestionSet {
        QuestionSet::new((1..=n).map(|i| question(&i.to_string(), "a")).collect())
            .expect("fixture ids are unique")
    }
}
