//! Session controller: `NotStarted -> Running -> Submitting -> Succeeded | Failed`.
//!
//! All mutation goes through `&mut ExamSession`, so ticks, navigation and
//! submission triggers are serialized by the borrow checker. The only
//! background work is the submission pipeline task, whose result is folded
//! back in by [`ExamSession::refresh`] or [`ExamSession::wait_for_outcome`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use crate::error::{SessionError, StartupError};
use crate::model::{AnswerMap, OptionKey, Question, QuestionId, QuestionSet, SessionState};
use crate::navigator::Navigator;
use crate::persistence::{DeliveredResult, PendingSubmission, PersistenceAdapter};
use crate::pipeline::{
    Submission, SubmissionAttempt, SubmissionHandle, SubmissionOutcome, SubmissionPayload,
    SubmissionPipeline, SubmissionReceipt,
};
use crate::scoring::{self, AnswerReview, MarkingScheme, ScoreReport};
use crate::timer::{Tick, Timer};
use crate::traits::QuestionSource;

/// Per-exam settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamConfig {
    pub duration_secs: u64,
    pub marking: MarkingScheme,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            duration_secs: 3600,
            marking: MarkingScheme::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Running,
    Submitting,
    Succeeded,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Succeeded | SessionPhase::Failed)
    }
}

/// How `start` entered the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// No usable saved state; started at question 1 with the full duration.
    Fresh,
    /// Restored a saved, unexpired session.
    Resumed,
    /// Restored a session with no time left; submission was forced.
    Expired,
    /// Found an unacknowledged result and resent it.
    ResumedSubmission,
    /// The result was already delivered; the session is `Succeeded`.
    AlreadyDelivered,
}

/// What caused the transition into `Submitting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started,
    /// The session was not running; nothing happened.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining_secs: u64 },
    /// Time ran out on this tick and submission was forced.
    Expired,
    Inactive,
}

/// Whether a persist was user-driven or the per-second background save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Explicit,
    Background,
}

/// Read-only view for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub candidate: Option<String>,
    pub current_index: usize,
    pub total: usize,
    pub answered: usize,
    pub remaining_secs: u64,
    pub last_save: Option<SaveKind>,
    pub submission: Option<SubmissionAttempt>,
}

/// One candidate's exam.
///
/// Submitting spawns a Tokio task, so the session must be driven from within
/// a Tokio runtime.
pub struct ExamSession {
    config: ExamConfig,
    persistence: PersistenceAdapter,
    pipeline: SubmissionPipeline,
    phase: SessionPhase,
    candidate: Option<String>,
    source_file: Option<String>,
    navigator: Navigator,
    timer: Timer,
    expired: Arc<AtomicBool>,
    last_save: Option<SaveKind>,
    report: Option<ScoreReport>,
    submission: Option<Submission>,
    handle: Option<SubmissionHandle>,
    outcome: Option<SubmissionOutcome>,
}

impl ExamSession {
    pub fn new(
        config: ExamConfig,
        persistence: PersistenceAdapter,
        pipeline: SubmissionPipeline,
    ) -> Self {
        Self {
            config,
            persistence,
            pipeline,
            phase: SessionPhase::NotStarted,
            candidate: None,
            source_file: None,
            navigator: Navigator::new(QuestionSet::default()),
            timer: Timer::new(),
            expired: Arc::new(AtomicBool::new(false)),
            last_save: None,
            report: None,
            submission: None,
            handle: None,
            outcome: None,
        }
    }

    /// Load the question set and enter `Running`, resuming saved progress.
    ///
    /// On error the session stays `NotStarted` and `start` may be called
    /// again.
    pub async fn start(
        &mut self,
        candidate: &str,
        source: &dyn QuestionSource,
    ) -> Result<StartOutcome, StartupError> {
        if self.phase != SessionPhase::NotStarted {
            return Err(StartupError::AlreadyStarted);
        }
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(StartupError::MissingCandidate);
        }

        let loaded = source.fetch_questions().await.inspect_err(|e| {
            tracing::warn!(candidate, "could not load question set: {e}");
        })?;
        let questions = QuestionSet::new(loaded.questions)?;
        if questions.is_empty() {
            return Err(StartupError::Empty);
        }
        tracing::info!(
            candidate,
            questions = questions.len(),
            source = loaded.source_file.as_deref().unwrap_or("default"),
            "question set loaded"
        );

        self.candidate = Some(candidate.to_string());
        self.source_file = loaded.source_file;
        let saved = self
            .persistence
            .load(candidate)
            .map(|state| state.reconcile(&questions, self.config.duration_secs));

        if let Some(delivered) = self.persistence.load_delivered(candidate) {
            tracing::info!(candidate, submission = %delivered.submission.id, "result already delivered");
            self.navigator = match saved {
                Some(state) => Navigator::resume(questions, state.current_index, state.answers),
                None => Navigator::new(questions),
            };
            self.timer.cancel();
            self.report = Some(delivered.report);
            self.submission = Some(delivered.submission);
            self.outcome = Some(SubmissionOutcome {
                attempt: delivered.attempt,
                receipt: delivered.receipt,
            });
            self.phase = SessionPhase::Succeeded;
            return Ok(StartOutcome::AlreadyDelivered);
        }

        if let Some(pending) = self.persistence.load_pending(candidate) {
            tracing::info!(candidate, submission = %pending.submission.id, "resending unacknowledged result");
            self.navigator = match saved {
                Some(state) => Navigator::resume(questions, state.current_index, state.answers),
                None => Navigator::new(questions),
            };
            self.timer.cancel();
            self.enter_submitting(pending.submission, pending.report);
            return Ok(StartOutcome::ResumedSubmission);
        }

        let (state, mut outcome) = match saved {
            Some(state) => (state, StartOutcome::Resumed),
            None => (
                SessionState::fresh(candidate, self.config.duration_secs),
                StartOutcome::Fresh,
            ),
        };
        self.navigator = Navigator::resume(questions, state.current_index, state.answers);

        self.timer = Timer::new();
        self.expired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&self.expired);
        self.timer.on_expire(move || flag.store(true, Ordering::SeqCst));

        self.phase = SessionPhase::Running;
        self.timer.start(state.remaining_seconds);
        tracing::info!(
            candidate,
            ?outcome,
            index = self.navigator.current_index(),
            remaining_secs = state.remaining_seconds,
            "session running"
        );

        if self.take_expiry() {
            self.persist(SaveKind::Background);
            self.begin_submission(SubmitTrigger::Expired);
            outcome = StartOutcome::Expired;
        } else {
            self.persist(SaveKind::Explicit);
        }
        Ok(outcome)
    }

    /// Move by `delta` questions. Out-of-range moves are no-ops.
    pub fn go_to(&mut self, delta: i64) -> Result<bool, SessionError> {
        self.ensure_running()?;
        let moved = self.navigator.go_to(delta);
        if moved {
            self.persist(SaveKind::Explicit);
        }
        Ok(moved)
    }

    pub fn next(&mut self) -> Result<bool, SessionError> {
        self.go_to(1)
    }

    pub fn previous(&mut self) -> Result<bool, SessionError> {
        self.go_to(-1)
    }

    /// Jump to a zero-based position.
    pub fn jump_to(&mut self, index: usize) -> Result<bool, SessionError> {
        self.ensure_running()?;
        if index >= self.navigator.total() {
            return Ok(false);
        }
        let delta = i64::try_from(index).ok().and_then(|target| {
            let current = i64::try_from(self.navigator.current_index()).ok()?;
            target.checked_sub(current)
        });
        match delta {
            Some(delta) => self.go_to(delta),
            None => Ok(false),
        }
    }

    /// Record an answer and persist.
    pub fn select(&mut self, question: &QuestionId, option: &OptionKey) -> Result<(), SessionError> {
        self.ensure_running()?;
        self.navigator.record_answer(question, option)?;
        self.persist(SaveKind::Explicit);
        Ok(())
    }

    /// Answer the question currently shown.
    pub fn select_current(&mut self, option: &OptionKey) -> Result<(), SessionError> {
        self.ensure_running()?;
        let id = match self.navigator.current_question() {
            Some(q) => q.id.clone(),
            None => return Err(SessionError::NotRunning),
        };
        self.select(&id, option)
    }

    /// Advance the countdown by one second. Call once per second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != SessionPhase::Running {
            return TickOutcome::Inactive;
        }
        let tick = self.timer.tick();
        if self.take_expiry() {
            self.persist(SaveKind::Background);
            self.begin_submission(SubmitTrigger::Expired);
            return TickOutcome::Expired;
        }
        match tick {
            Tick::Running { remaining_secs } => {
                self.persist(SaveKind::Background);
                TickOutcome::Running { remaining_secs }
            }
            Tick::Expired | Tick::Inactive => TickOutcome::Inactive,
        }
    }

    /// Candidate-initiated submission. Ignored unless `Running`.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.phase != SessionPhase::Running {
            tracing::debug!(phase = ?self.phase, "submit ignored");
            return SubmitOutcome::Ignored;
        }
        self.begin_submission(SubmitTrigger::Manual);
        SubmitOutcome::Started
    }

    /// Fold a finished submission into the session phase. Never blocks.
    pub fn refresh(&mut self) -> SessionPhase {
        if self.phase == SessionPhase::Submitting {
            let finished = self
                .handle
                .as_mut()
                .and_then(|handle| handle.try_outcome().cloned());
            if let Some(outcome) = finished {
                self.finish(outcome);
            }
        }
        self.phase
    }

    /// Wait for the submission to reach a terminal state.
    ///
    /// Returns `None` if no submission was ever started.
    pub async fn wait_for_outcome(&mut self) -> Option<&SubmissionOutcome> {
        if self.phase == SessionPhase::Submitting {
            if let Some(handle) = self.handle.as_mut() {
                let outcome = handle.wait().await.clone();
                self.finish(outcome);
            }
        }
        self.outcome.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }

    /// Name to show the candidate: the backend's saved name once known.
    pub fn display_name(&self) -> Option<&str> {
        self.receipt()
            .and_then(|r| r.saved_name.as_deref())
            .or(self.candidate.as_deref())
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.navigator.current_question()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn answers(&self) -> &AnswerMap {
        self.navigator.answers()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.timer.remaining_secs()
    }

    pub fn last_save(&self) -> Option<SaveKind> {
        self.last_save
    }

    /// The computed result. Present from `Submitting` on, including `Failed`.
    pub fn score_report(&self) -> Option<&ScoreReport> {
        self.report.as_ref()
    }

    /// Per-question breakdown, once the result has been computed.
    pub fn review(&self) -> Option<Vec<AnswerReview>> {
        self.report
            .as_ref()
            .map(|_| scoring::review(self.navigator.questions(), self.navigator.answers()))
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.outcome.as_ref().and_then(|o| o.receipt.as_ref())
    }

    /// Latest submission snapshot, if submission has begun.
    pub fn submission_status(&self) -> Option<SubmissionAttempt> {
        match (&self.outcome, &self.handle) {
            (Some(outcome), _) => Some(outcome.attempt.clone()),
            (None, Some(handle)) => Some(handle.status()),
            (None, None) => None,
        }
    }

    /// Receiver notified on every submission transition.
    pub fn subscribe_submission(&self) -> Option<watch::Receiver<SubmissionAttempt>> {
        self.handle.as_ref().map(SubmissionHandle::subscribe)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            candidate: self.candidate.clone(),
            current_index: self.navigator.current_index(),
            total: self.navigator.total(),
            answered: self.navigator.answers().len(),
            remaining_secs: self.timer.remaining_secs(),
            last_save: self.last_save,
            submission: self.submission_status(),
        }
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Running {
            Ok(())
        } else {
            Err(SessionError::NotRunning)
        }
    }

    fn take_expiry(&self) -> bool {
        self.expired.swap(false, Ordering::SeqCst)
    }

    fn persist(&mut self, kind: SaveKind) {
        let Some(candidate) = self.candidate.as_deref() else {
            return;
        };
        let state = SessionState {
            candidate_id: candidate.to_string(),
            current_index: self.navigator.current_index(),
            answers: self.navigator.answers().clone(),
            remaining_seconds: self.timer.remaining_secs(),
        };
        match self.persistence.save(candidate, &state) {
            Ok(()) => {
                tracing::debug!(candidate, ?kind, "session saved");
                self.last_save = Some(kind);
            }
            Err(e) => tracing::warn!(candidate, "failed to save session: {e}"),
        }
    }

    fn begin_submission(&mut self, trigger: SubmitTrigger) {
        self.timer.cancel();
        let Some(candidate) = self.candidate.clone() else {
            return;
        };

        let report = scoring::score(
            self.navigator.questions(),
            self.navigator.answers(),
            &self.config.marking,
        );
        tracing::info!(
            candidate = %candidate,
            ?trigger,
            score = report.score,
            pass = report.pass,
            "exam finished"
        );

        let payload = SubmissionPayload::new(
            candidate.clone(),
            self.navigator.answers().clone(),
            &report,
            Utc::now(),
            self.source_file.clone(),
        );
        let pending = PendingSubmission {
            submission: Submission::new(payload),
            report,
        };
        if let Err(e) = self.persistence.save_pending(&candidate, &pending) {
            tracing::warn!(candidate = %candidate, "failed to save pending result: {e}");
        }
        self.enter_submitting(pending.submission, pending.report);
    }

    fn enter_submitting(&mut self, submission: Submission, report: ScoreReport) {
        self.report = Some(report);
        self.handle = Some(self.pipeline.spawn(submission.clone()));
        self.submission = Some(submission);
        self.phase = SessionPhase::Submitting;
    }

    fn finish(&mut self, outcome: SubmissionOutcome) {
        let candidate = self.candidate.clone().unwrap_or_default();
        if outcome.succeeded() {
            if let (Some(submission), Some(report)) = (&self.submission, &self.report) {
                let delivered = DeliveredResult {
                    submission: submission.clone(),
                    report: report.clone(),
                    attempt: outcome.attempt.clone(),
                    receipt: outcome.receipt.clone(),
                };
                if let Err(e) = self.persistence.save_delivered(&candidate, &delivered) {
                    tracing::warn!(candidate = %candidate, "failed to record delivered result: {e}");
                }
            }
            if let Err(e) = self.persistence.clear_pending(&candidate) {
                tracing::warn!(candidate = %candidate, "failed to clear pending result: {e}");
            }
            tracing::info!(
                candidate = %candidate,
                attempts = outcome.attempt.attempt_count,
                "result delivered"
            );
            self.phase = SessionPhase::Succeeded;
        } else {
            tracing::error!(
                candidate = %candidate,
                attempts = outcome.attempt.attempt_count,
                "result not delivered; it stays saved for resending"
            );
            self.phase = SessionPhase::Failed;
        }
        self.outcome = Some(outcome);
    }
}
