//! Question-set parser.
//!
//! Loads question sets from JSON text or files, and validates them.

use std::path::Path;

use anyhow::{Context, Result};

use crate::error::StartupError;
use crate::model::{Question, QuestionSet};

/// Parse a JSON array of questions into a `QuestionSet`.
///
/// Invalid JSON and duplicate IDs are errors. An empty array parses into an
/// empty set; callers that cannot run on it check `is_empty()`.
pub fn parse_question_set_str(content: &str) -> Result<QuestionSet, StartupError> {
    let questions: Vec<Question> =
        serde_json::from_str(content).map_err(|e| StartupError::Malformed(e.to_string()))?;
    QuestionSet::new(questions)
}

/// Parse a question-set file from disk.
pub fn parse_question_file(path: &Path) -> Result<QuestionSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question file: {}", path.display()))?;
    parse_question_set_str(&content)
        .with_context(|| format!("failed to parse question file: {}", path.display()))
}

/// A warning from question-set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate raw questions for common authoring issues.
///
/// Takes the unvalidated list so duplicate IDs can be reported rather than
/// rejected outright.
pub fn validate_questions(questions: &[Question]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "question set is empty".into(),
        });
    }

    let mut seen_ids = std::collections::HashSet::new();
    for q in questions {
        if !seen_ids.insert(&q.id) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.to_string()),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
    }

    for q in questions {
        if !q.has_option(&q.correct_option) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.to_string()),
                message: format!(
                    "correct answer '{}' is not one of the options",
                    q.correct_option
                ),
            });
        }
    }

    for q in questions {
        if q.prompt.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.to_string()),
                message: "question text is empty".into(),
            });
        }
    }

    for q in questions {
        if q.options.len() < 2 {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.to_string()),
                message: format!("only {} option(s) offered", q.options.len()),
            });
        }
    }

    warnings
}

/// Read a question file without rejecting duplicates, for validation reports.
pub fn read_questions_lenient(path: &Path) -> Result<Vec<Question>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse question file: {}", path.display()))
}
