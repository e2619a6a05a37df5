//! Collaborator traits for the question-set fetch and result submission.
//!
//! Implemented over HTTP by `examdesk-client`. The session controller and
//! submission pipeline only ever see these contracts.

use async_trait::async_trait;

use crate::error::{StartupError, SubmissionError};
use crate::model::Question;
use crate::pipeline::{Submission, SubmissionReceipt};

/// Questions as delivered by a source, before set validation.
#[derive(Debug, Clone)]
pub struct LoadedQuestions {
    /// Name of the question file the set came from, if known. Carried into
    /// the submission payload.
    pub source_file: Option<String>,
    /// Questions in navigation order.
    pub questions: Vec<Question>,
}

/// Supplies the ordered question set at session start.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the question set. Unreachable or missing sets are
    /// `StartupError::Unavailable`; unparseable ones `StartupError::Malformed`.
    async fn fetch_questions(&self) -> Result<LoadedQuestions, StartupError>;
}

/// Accepts graded results.
///
/// Implementations perform exactly one delivery attempt per call; retrying
/// is the pipeline's job. Any `Ok` is authoritative.
#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    async fn submit(&self, submission: &Submission) -> Result<SubmissionReceipt, SubmissionError>;
}
