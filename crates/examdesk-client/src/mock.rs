//! Scripted in-process backend for testing sessions without a server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examdesk_core::error::{StartupError, SubmissionError};
use examdesk_core::model::Question;
use examdesk_core::pipeline::{Submission, SubmissionReceipt};
use examdesk_core::traits::{LoadedQuestions, QuestionSource, SubmissionBackend};

/// Serves a fixed question set and replays scripted submission results.
///
/// Once the script is exhausted every submission succeeds with a receipt
/// echoing the candidate name.
pub struct MockBackend {
    questions: Result<Vec<Question>, StartupError>,
    script: Mutex<VecDeque<Result<SubmissionReceipt, SubmissionError>>>,
    call_count: AtomicU32,
    submissions: Mutex<Vec<Submission>>,
}

impl MockBackend {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: Ok(questions),
            script: Mutex::new(VecDeque::new()),
            call_count: AtomicU32::new(0),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// A backend whose question fetch always fails with `error`.
    pub fn unavailable(error: StartupError) -> Self {
        Self {
            questions: Err(error),
            ..Self::new(Vec::new())
        }
    }

    /// Queue results for the next submissions, in order.
    pub fn with_script(
        self,
        script: impl IntoIterator<Item = Result<SubmissionReceipt, SubmissionError>>,
    ) -> Self {
        if let Ok(mut queue) = self.script.lock() {
            queue.extend(script);
        }
        self
    }

    /// Fail the next `n` submissions with HTTP `status`.
    pub fn failing(self, n: usize, status: u16) -> Self {
        self.with_script((0..n).map(|_| {
            Err(SubmissionError::Rejected {
                status,
                message: "scripted failure".into(),
            })
        }))
    }

    /// Number of submission attempts received.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Every submission received, in order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn last_submission(&self) -> Option<Submission> {
        self.submissions().pop()
    }
}

#[async_trait]
impl QuestionSource for MockBackend {
    async fn fetch_questions(&self) -> Result<LoadedQuestions, StartupError> {
        self.questions.clone().map(|questions| LoadedQuestions {
            source_file: Some("mock.json".into()),
            questions,
        })
    }
}

#[async_trait]
impl SubmissionBackend for MockBackend {
    async fn submit(&self, submission: &Submission) -> Result<SubmissionReceipt, SubmissionError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut seen) = self.submissions.lock() {
            seen.push(submission.clone());
        }
        let scripted = self.script.lock().ok().and_then(|mut q| q.pop_front());
        scripted.unwrap_or_else(|| {
            Ok(SubmissionReceipt {
                saved_name: Some(submission.payload.student_name.clone()),
                was_renamed: false,
            })
        })
    }
}
