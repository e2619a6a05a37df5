//! The `examdesk discard` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use examdesk_client::config::load_config_from;
use examdesk_core::persistence::PersistenceAdapter;
use examdesk_store::FileStore;

pub fn execute(candidate: String, config_path: Option<PathBuf>) -> Result<()> {
    let candidate = candidate.trim();
    anyhow::ensure!(!candidate.is_empty(), "a candidate name or ID is required");

    let config = load_config_from(config_path.as_deref())?;
    let store = FileStore::open(&config.store_dir)
        .with_context(|| format!("failed to open store: {}", config.store_dir.display()))?;
    let persistence = PersistenceAdapter::new(Arc::new(store));

    let had_session = persistence.load(candidate).is_some();
    let had_pending = persistence.load_pending(candidate).is_some();
    let had_delivered = persistence.load_delivered(candidate).is_some();
    persistence
        .clear(candidate)
        .context("failed to remove saved session")?;
    persistence
        .clear_pending(candidate)
        .context("failed to remove unsent result")?;
    persistence
        .clear_delivered(candidate)
        .context("failed to remove delivered result")?;

    match (had_session || had_delivered, had_pending) {
        (false, false) => println!("Nothing saved for {candidate}."),
        (_, true) => {
            println!("Discarded saved progress for {candidate}, including a result that was never delivered.")
        }
        (true, false) => println!("Discarded saved progress for {candidate}."),
    }
    Ok(())
}
