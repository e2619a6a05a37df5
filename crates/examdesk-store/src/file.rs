//! Directory-backed key/value store.
//!
//! Each key maps to `<root>/<slot>-<candidate>.json`, with the candidate
//! percent-encoded so any name is a safe file name. Writes go to a temporary
//! file in the same directory, are synced, then renamed over the target, so a
//! crash mid-write leaves either the old value or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use examdesk_core::error::PersistenceError;
use examdesk_core::persistence::{KeyValueStore, StorageKey};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened session store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds `key`.
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.root.join(format!(
            "{}-{}.json",
            key.slot.as_str(),
            encode_component(&key.candidate_id)
        ))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &StorageKey) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &StorageKey, value: &str) -> Result<(), PersistenceError> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn delete(&self, key: &StorageKey) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ASCII alphanumerics, '-' and '_' pass through; every other byte becomes %XX.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use examdesk_core::model::SessionState;
    use examdesk_core::persistence::{PersistenceAdapter, Slot};

    use super::*;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("sessions")).unwrap();
        (dir, store)
    }

    #[test]
    fn encodes_unsafe_names() {
        assert_eq!(encode_component("Ana_Lee-2"), "Ana_Lee-2");
        assert_eq!(encode_component("a b/../c"), "a%20b%2F%2E%2E%2Fc");
        assert_eq!(encode_component("Zoë"), "Zo%C3%AB");
    }

    #[test]
    fn raw_read_write_delete() {
        let (_dir, store) = store();
        let key = StorageKey::new(Slot::Session, "Ana");

        assert_eq!(store.read(&key).unwrap(), None);
        store.write(&key, "one").unwrap();
        store.write(&key, "two").unwrap();
        assert_eq!(store.read(&key).unwrap().as_deref(), Some("two"));

        store.delete(&key).unwrap();
        store.delete(&key).unwrap();
        assert_eq!(store.read(&key).unwrap(), None);
    }

    #[test]
    fn adapter_round_trip_survives_reopen() {
        let (dir, store) = store();
        let mut state = SessionState::fresh("Ana Lee", 600);
        state.current_index = 4;
        state.remaining_seconds = 321;
        state.answers.record("3".into(), "d".into());

        PersistenceAdapter::new(Arc::new(store))
            .save("Ana Lee", &state)
            .unwrap();

        let reopened = FileStore::open(dir.path().join("sessions")).unwrap();
        let loaded = PersistenceAdapter::new(Arc::new(reopened)).load("Ana Lee");
        assert_eq!(loaded, Some(state));
    }

    #[test]
    fn corrupt_file_loads_as_absent() {
        let (_dir, store) = store();
        let key = StorageKey::new(Slot::Session, "Ana");
        fs::write(store.path_for(&key), "{\"candidateId\": ").unwrap();

        let adapter = PersistenceAdapter::new(Arc::new(store));
        assert_eq!(adapter.load("Ana"), None);
    }

    #[test]
    fn slots_use_separate_files() {
        let (_dir, store) = store();
        let session = StorageKey::new(Slot::Session, "Ana");
        let pending = StorageKey::new(Slot::PendingSubmission, "Ana");
        assert_ne!(store.path_for(&session), store.path_for(&pending));

        store.write(&pending, "{}").unwrap();
        assert_eq!(store.read(&session).unwrap(), None);
        assert!(store.path_for(&pending).starts_with(store.root()));
    }
}
