//! Resilient result submission.
//!
//! States: `Idle -> Submitting -> {Succeeded | Retrying -> Submitting | Failed}`.
//! Every failure is retried with capped exponential backoff until the attempt
//! ceiling is reached. Each attempt resends the identical [`Submission`] so
//! the backend can deduplicate on `(studentName, timestamp)`.
//!
//! Progress is published as [`SubmissionAttempt`] snapshots, both to a
//! [`SubmissionObserver`] and, for spawned runs, to a `watch` channel. UIs
//! render countdowns from those snapshots and never keep their own timers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::error::SubmissionErrorKind;
use crate::model::AnswerMap;
use crate::scoring::ScoreReport;
use crate::traits::SubmissionBackend;

/// JSON body posted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub student_name: String,
    pub answers: AnswerMap,
    pub score: f64,
    pub total_marks: f64,
    /// ISO-8601 with millisecond precision, fixed at creation.
    pub timestamp: String,
    pub attempted: usize,
    pub correct: usize,
    pub wrong: usize,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_file: Option<String>,
}

impl SubmissionPayload {
    pub fn new(
        student_name: impl Into<String>,
        answers: AnswerMap,
        report: &ScoreReport,
        submitted_at: DateTime<Utc>,
        question_file: Option<String>,
    ) -> Self {
        Self {
            student_name: student_name.into(),
            answers,
            score: report.score,
            total_marks: report.total_marks,
            timestamp: submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            attempted: report.attempted,
            correct: report.correct,
            wrong: report.wrong,
            pass: report.pass,
            question_file,
        }
    }
}

/// A payload plus the idempotency key that travels with every resend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub payload: SubmissionPayload,
}

impl Submission {
    pub fn new(payload: SubmissionPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
        }
    }
}

/// What the backend said on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    /// The name the backend stored the result under. Authoritative for display.
    #[serde(default)]
    pub saved_name: Option<String>,
    #[serde(default)]
    pub was_renamed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Submitting,
    Retrying,
    Failed,
    Succeeded,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Failed | SubmissionStatus::Succeeded)
    }
}

/// Snapshot of the pipeline, emitted on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAttempt {
    pub status: SubmissionStatus,
    /// Attempts issued so far, including the one in flight.
    pub attempt_count: u32,
    /// Delay before the next attempt while `Retrying`, otherwise 0.
    pub next_retry_delay_ms: u64,
    pub last_error: Option<SubmissionErrorKind>,
}

/// Attempt ceiling and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Receives every status snapshot.
pub trait SubmissionObserver: Send + Sync {
    fn on_status(&self, attempt: &SubmissionAttempt);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SubmissionObserver for NoopObserver {
    fn on_status(&self, _: &SubmissionAttempt) {}
}

struct WatchObserver(watch::Sender<SubmissionAttempt>);

impl SubmissionObserver for WatchObserver {
    fn on_status(&self, attempt: &SubmissionAttempt) {
        self.0.send_replace(attempt.clone());
    }
}

/// Terminal result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Final snapshot; status is `Succeeded` or `Failed`.
    pub attempt: SubmissionAttempt,
    pub receipt: Option<SubmissionReceipt>,
}

impl SubmissionOutcome {
    pub fn succeeded(&self) -> bool {
        self.attempt.status == SubmissionStatus::Succeeded
    }
}

/// Delivers submissions to a backend with bounded retries.
#[derive(Clone)]
pub struct SubmissionPipeline {
    backend: Arc<dyn SubmissionBackend>,
    policy: RetryPolicy,
}

impl SubmissionPipeline {
    pub fn new(backend: Arc<dyn SubmissionBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Drive one submission to `Succeeded` or `Failed`.
    pub async fn run(
        &self,
        submission: &Submission,
        observer: &dyn SubmissionObserver,
    ) -> SubmissionOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = SubmissionAttempt::default();
        observer.on_status(&attempt);

        loop {
            attempt.attempt_count += 1;
            attempt.status = SubmissionStatus::Submitting;
            attempt.next_retry_delay_ms = 0;
            observer.on_status(&attempt);

            match self.backend.submit(submission).await {
                Ok(receipt) => {
                    tracing::info!(
                        submission = %submission.id,
                        attempts = attempt.attempt_count,
                        "submission acknowledged"
                    );
                    attempt.status = SubmissionStatus::Succeeded;
                    observer.on_status(&attempt);
                    return SubmissionOutcome {
                        attempt,
                        receipt: Some(receipt),
                    };
                }
                Err(e) => {
                    attempt.last_error = Some(e.kind());
                    if !e.is_retryable() || attempt.attempt_count >= max_attempts {
                        tracing::error!(
                            submission = %submission.id,
                            attempts = attempt.attempt_count,
                            "submission failed, giving up: {e}"
                        );
                        attempt.status = SubmissionStatus::Failed;
                        observer.on_status(&attempt);
                        return SubmissionOutcome {
                            attempt,
                            receipt: None,
                        };
                    }

                    let delay = self.policy.delay_after(attempt.attempt_count);
                    tracing::warn!(
                        submission = %submission.id,
                        attempt = attempt.attempt_count,
                        retry_in_ms = delay.as_millis() as u64,
                        "submission attempt failed: {e}"
                    );
                    attempt.status = SubmissionStatus::Retrying;
                    attempt.next_retry_delay_ms = delay.as_millis() as u64;
                    observer.on_status(&attempt);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Run in a background task. Must be called within a Tokio runtime.
    pub fn spawn(&self, submission: Submission) -> SubmissionHandle {
        let (tx, rx) = watch::channel(SubmissionAttempt::default());
        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            let observer = WatchObserver(tx);
            pipeline.run(&submission, &observer).await
        });
        SubmissionHandle {
            status: rx,
            task: Some(task),
            outcome: None,
        }
    }
}

/// A submission running in the background.
#[derive(Debug)]
pub struct SubmissionHandle {
    status: watch::Receiver<SubmissionAttempt>,
    task: Option<JoinHandle<SubmissionOutcome>>,
    outcome: Option<SubmissionOutcome>,
}

impl SubmissionHandle {
    /// The latest snapshot.
    pub fn status(&self) -> SubmissionAttempt {
        self.status.borrow().clone()
    }

    /// A receiver that is notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<SubmissionAttempt> {
        self.status.clone()
    }

    /// The outcome, if the run has finished. Never blocks.
    pub fn try_outcome(&mut self) -> Option<&SubmissionOutcome> {
        if self.outcome.is_none() {
            let joined = match self.task.as_mut() {
                Some(task) if task.is_finished() => task.now_or_never(),
                _ => None,
            };
            if let Some(joined) = joined {
                self.task = None;
                self.outcome = Some(self.settle(joined));
            }
        }
        self.outcome.as_ref()
    }

    /// Wait for the run to finish.
    pub async fn wait(&mut self) -> &SubmissionOutcome {
        if self.outcome.is_none() {
            if let Some(task) = self.task.take() {
                let joined = task.await;
                self.outcome = Some(self.settle(joined));
            }
        }
        let status = &self.status;
        self.outcome
            .get_or_insert_with(|| Self::abandoned(status.borrow().clone()))
    }

    fn settle(&self, joined: Result<SubmissionOutcome, JoinError>) -> SubmissionOutcome {
        match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("submission task aborted: {e}");
                Self::abandoned(self.status())
            }
        }
    }

    fn abandoned(mut attempt: SubmissionAttempt) -> SubmissionOutcome {
        attempt.status = SubmissionStatus::Failed;
        SubmissionOutcome {
            attempt,
            receipt: None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use SubmissionStatus::*;

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fourth_attempt() {
        let backend = Arc::new(FlakyBackend::new(3));
        let pipeline = SubmissionPipeline::new(backend.clone(), RetryPolicy::default());
        let observer = RecordingObserver::default();
        let submission = sample_submission();

        let start = tokio::time::Instant::now();
        let outcome = pipeline.run(&submission, &observer).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.attempt.attempt_count, 4);
        assert_eq!(backend.calls(), 4);
        assert_eq!(
            observer.statuses(),
            vec![
                Idle, Submitting, Retrying, Submitting, Retrying, Submitting, Retrying,
                Submitting, Succeeded
            ]
        );
        let delays: Vec<u64> = observer
            .seen
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.status == Retrying)
            .map(|a| a.next_retry_delay_ms)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000]);
        assert!(start.elapsed() >= Duration::from_secs(7));
        assert_eq!(
            outcome.receipt.and_then(|r| r.saved_name).as_deref(),
            Some("Nadia")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resends_identical_submission() {
        let backend = Arc::new(FlakyBackend::new(2));
        let pipeline = SubmissionPipeline::new(backend.clone(), RetryPolicy::default());
        let submission = sample_submission();

        pipeline.run(&submission, &NoopObserver).await;

        let seen = backend.seen();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|s| *s == submission));
    }

    #[tokio::test(start_paused = true)]
    async fn fails_after_ten_attempts() {
        let backend = Arc::new(FlakyBackend::always_failing());
        let pipeline = SubmissionPipeline::new(backend.clone(), RetryPolicy::default());
        let observer = RecordingObserver::default();

        let outcome = pipeline.run(&sample_submission(), &observer).await;

        assert_eq!(outcome.attempt.status, Failed);
        assert_eq!(outcome.attempt.attempt_count, 10);
        assert_eq!(outcome.attempt.last_error, Some(SubmissionErrorKind::Status(503)));
        assert_eq!(backend.calls(), 10);
        assert_eq!(observer.statuses().last(), Some(&Failed));
        assert_eq!(
            observer.statuses().iter().filter(|s| **s == Retrying).count(),
            9
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=9)
            .map(|n| policy.delay_after(n).as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000, 30000]
        );
        assert_eq!(policy.delay_after(200), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_run_publishes_status() {
        let backend = Arc::new(FlakyBackend::new(1));
        let pipeline = SubmissionPipeline::new(backend, RetryPolicy::default());

        let mut handle = pipeline.spawn(sample_submission());
        let mut rx = handle.subscribe();

        let mut saw_retrying = false;
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.status == Retrying {
                saw_retrying = true;
                assert_eq!(snapshot.next_retry_delay_ms, 1000);
            }
            if snapshot.status.is_terminal() {
                break;
            }
        }
        assert!(saw_retrying);

        let outcome = handle.wait().await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.attempt.attempt_count, 2);
        assert_eq!(handle.status().status, Succeeded);
        assert!(handle.try_outcome().is_some());
    }

    #[test]
    fn payload_wire_format() {
        let submission = sample_submission();
        let json = serde_json::to_value(&submission.payload).unwrap();
        for field in [
            "studentName",
            "answers",
            "score",
            "totalMarks",
            "timestamp",
            "attempted",
            "correct",
            "wrong",
            "pass",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert!(json.get("questionFile").is_none());
        let ts = json["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
