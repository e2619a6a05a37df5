//! Persistence adapter: session state and pending submissions, keyed by candidate.
//!
//! The storage mechanism sits behind [`KeyValueStore`] so it can be a file
//! directory, an embedded KV store or anything else without touching the
//! session controller. Reads are forgiving: a missing, unreadable or corrupt
//! value is reported as `None` and never propagated.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::model::SessionState;
use crate::pipeline::{Submission, SubmissionAttempt, SubmissionReceipt};
use crate::scoring::ScoreReport;

/// Which record a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The running exam (`SessionState`).
    Session,
    /// A computed result that has not been acknowledged by the backend.
    PendingSubmission,
    /// A result the backend acknowledged.
    Delivered,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Session => "session",
            Slot::PendingSubmission => "pending",
            Slot::Delivered => "delivered",
        }
    }
}

/// Address of one record: a slot namespaced by candidate identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub slot: Slot,
    pub candidate_id: String,
}

impl StorageKey {
    pub fn new(slot: Slot, candidate_id: impl Into<String>) -> Self {
        Self {
            slot,
            candidate_id: candidate_id.into(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot.as_str(), self.candidate_id)
    }
}

/// Raw durable key/value storage.
///
/// Writes must be durable when they return. `read` returns `Ok(None)` for a
/// key that was never written or has been deleted.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &StorageKey) -> Result<Option<String>, PersistenceError>;

    fn write(&self, key: &StorageKey, value: &str) -> Result<(), PersistenceError>;

    /// Remove a key. Deleting a missing key is not an error.
    fn delete(&self, key: &StorageKey) -> Result<(), PersistenceError>;
}

/// In-process store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<StorageKey, String>>, PersistenceError> {
        self.entries
            .lock()
            .map_err(|_| PersistenceError::Backend("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &StorageKey) -> Result<Option<String>, PersistenceError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &StorageKey, value: &str) -> Result<(), PersistenceError> {
        self.lock()?.insert(key.clone(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &StorageKey) -> Result<(), PersistenceError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// A result that entered `Submitting` but was not yet acknowledged.
///
/// Holds the exact submission (same idempotency key and timestamp) so a
/// reload resends it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub submission: Submission,
    pub report: ScoreReport,
}

/// A result the backend acknowledged, kept so a restart shows it instead of
/// starting another attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredResult {
    pub submission: Submission,
    pub report: ScoreReport,
    pub attempt: SubmissionAttempt,
    #[serde(default)]
    pub receipt: Option<SubmissionReceipt>,
}

/// Typed access to session records on top of a [`KeyValueStore`].
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Durably write the session state for `candidate_id`.
    pub fn save(&self, candidate_id: &str, state: &SessionState) -> Result<(), PersistenceError> {
        self.write_json(&StorageKey::new(Slot::Session, candidate_id), state)
    }

    /// The saved state for `candidate_id`, or `None` if absent or corrupt.
    ///
    /// A record saved under a different candidate is treated as absent.
    pub fn load(&self, candidate_id: &str) -> Option<SessionState> {
        let state: SessionState = self.read_json(&StorageKey::new(Slot::Session, candidate_id))?;
        if state.candidate_id != candidate_id {
            tracing::warn!(
                candidate = candidate_id,
                stored = %state.candidate_id,
                "saved session belongs to another candidate, ignoring"
            );
            return None;
        }
        Some(state)
    }

    /// Remove the saved session state. Explicit candidate action only.
    pub fn clear(&self, candidate_id: &str) -> Result<(), PersistenceError> {
        self.store
            .delete(&StorageKey::new(Slot::Session, candidate_id))
    }

    pub fn save_pending(
        &self,
        candidate_id: &str,
        pending: &PendingSubmission,
    ) -> Result<(), PersistenceError> {
        self.write_json(
            &StorageKey::new(Slot::PendingSubmission, candidate_id),
            pending,
        )
    }

    pub fn load_pending(&self, candidate_id: &str) -> Option<PendingSubmission> {
        self.read_json(&StorageKey::new(Slot::PendingSubmission, candidate_id))
    }

    pub fn clear_pending(&self, candidate_id: &str) -> Result<(), PersistenceError> {
        self.store
            .delete(&StorageKey::new(Slot::PendingSubmission, candidate_id))
    }

    pub fn save_delivered(
        &self,
        candidate_id: &str,
        delivered: &DeliveredResult,
    ) -> Result<(), PersistenceError> {
        self.write_json(&StorageKey::new(Slot::Delivered, candidate_id), delivered)
    }

    pub fn load_delivered(&self, candidate_id: &str) -> Option<DeliveredResult> {
        self.read_json(&StorageKey::new(Slot::Delivered, candidate_id))
    }

    pub fn clear_delivered(&self, candidate_id: &str) -> Result<(), PersistenceError> {
        self.store
            .delete(&StorageKey::new(Slot::Delivered, candidate_id))
    }

    fn write_json<T: Serialize>(&self, key: &StorageKey, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(value)?;
        self.store.write(key, &json)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &StorageKey) -> Option<T> {
        let raw = match self.store.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%key, "failed to read saved state, starting fresh: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%key, "saved state is corrupt, ignoring: {e}");
                None
            }
        }
    }
}

impl fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceAdapter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerMap, OptionKey, QuestionId};

    fn adapter() -> (Arc<MemoryStore>, PersistenceAdapter) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), PersistenceAdapter::new(store))
    }

    fn sample_state(candidate: &str) -> SessionState {
        let mut answers = AnswerMap::new();
        answers.record(QuestionId::from("1"), OptionKey::from("c"));
        answers.record(QuestionId::from("4"), OptionKey::from("a"));
        SessionState {
            candidate_id: candidate.into(),
            current_index: 3,
            answers,
            remaining_seconds: 1234,
        }
    }

    #[test]
    fn save_then_load_returns_same_state() {
        let (_, persistence) = adapter();
        let state = sample_state("Karim");
        persistence.save("Karim", &state).unwrap();
        assert_eq!(persistence.load("Karim"), Some(state));
    }

    #[test]
    fn never_saved_is_none() {
        let (_, persistence) = adapter();
        assert_eq!(persistence.load("nobody"), None);
    }

    #[test]
    fn corrupt_value_is_none() {
        let (store, persistence) = adapter();
        store
            .write(&StorageKey::new(Slot::Session, "Karim"), "{not json")
            .unwrap();
        assert_eq!(persistence.load("Karim"), None);
    }

    #[test]
    fn candidates_do_not_collide() {
        let (_, persistence) = adapter();
        persistence.save("a", &sample_state("a")).unwrap();
        let mut other = sample_state("b");
        other.current_index = 0;
        persistence.save("b", &other).unwrap();

        assert_eq!(persistence.load("a").unwrap().current_index, 3);
        assert_eq!(persistence.load("b").unwrap().current_index, 0);
    }

    #[test]
    fn foreign_candidate_record_is_ignored() {
        let (store, persistence) = adapter();
        let json = serde_json::to_string(&sample_state("Someone Else")).unwrap();
        store
            .write(&StorageKey::new(Slot::Session, "Karim"), &json)
            .unwrap();
        assert_eq!(persistence.load("Karim"), None);
    }

    #[test]
    fn clear_removes_only_that_slot() {
        let (store, persistence) = adapter();
        persistence.save("Karim", &sample_state("Karim")).unwrap();
        store
            .write(&StorageKey::new(Slot::PendingSubmission, "Karim"), "{}")
            .unwrap();

        persistence.clear("Karim").unwrap();
        persistence.clear("Karim").unwrap();
        assert_eq!(persistence.load("Karim"), None);
        assert!(store
            .read(&StorageKey::new(Slot::PendingSubmission, "Karim"))
            .unwrap()
            .is_some());
    }
}
