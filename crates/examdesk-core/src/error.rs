//! Error taxonomy for the exam session engine.
//!
//! None of these are fatal to the process. Every variant leaves the candidate
//! with an actionable state: retry the start, keep answering, or reload after
//! the submission retries are exhausted. They live in `examdesk-core` so the
//! controller and pipeline can classify failures without string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{OptionKey, QuestionId};

/// The exam could not be started. The candidate may retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartupError {
    /// No candidate name or ID was given.
    #[error("a candidate name or ID is required")]
    MissingCandidate,

    /// `start` was called on a session that already left `NotStarted`.
    #[error("the session has already been started")]
    AlreadyStarted,

    /// The question set could not be fetched.
    #[error("question set unavailable: {0}")]
    Unavailable(String),

    /// The question set was fetched but could not be parsed.
    #[error("question set is malformed: {0}")]
    Malformed(String),

    /// The question set parsed but contains no questions.
    #[error("question set is empty")]
    Empty,

    /// Two questions share an ID, which would make answers ambiguous.
    #[error("duplicate question id: {0}")]
    DuplicateQuestion(QuestionId),
}

impl StartupError {
    /// Returns `true` if retrying the start may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StartupError::Unavailable(_))
    }
}

/// A candidate action that the session rejected. The session state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The action requires a running exam.
    #[error("the exam is not running")]
    NotRunning,

    /// The question ID is not part of the loaded set.
    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    /// The option key is not offered by the question.
    #[error("question {question} has no option {option}")]
    UnknownOption {
        question: QuestionId,
        option: OptionKey,
    },
}

/// A local durable store failed to read or write.
///
/// Reads never surface this upward: corrupt or missing state is treated as
/// absence. Writes log it and carry on.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode session state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// A single submission attempt failed. Always classified as retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The backend answered with a non-success status.
    #[error("backend rejected submission (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl SubmissionError {
    /// Every submission failure is transient as far as the pipeline is concerned.
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Compact classification for status snapshots.
    pub fn kind(&self) -> SubmissionErrorKind {
        match self {
            SubmissionError::Network(_) => SubmissionErrorKind::Network,
            SubmissionError::Timeout(_) => SubmissionErrorKind::Timeout,
            SubmissionError::Rejected { status, .. } => SubmissionErrorKind::Status(*status),
        }
    }
}

/// What went wrong on the last failed attempt, as exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionErrorKind {
    Network,
    Timeout,
    Status(u16),
}

impl std::fmt::Display for SubmissionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionErrorKind::Network => write!(f, "network error"),
            SubmissionErrorKind::Timeout => write!(f, "timeout"),
            SubmissionErrorKind::Status(code) => write!(f, "HTTP {code}"),
        }
    }
}
