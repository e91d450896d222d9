//! Per-invocation application context.
//!
//! Loads the state snapshot from `general.data_dir` and writes it back after
//! commands that change it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use watchpost_core::config::WatchpostConfig;
use watchpost_core::event::ChangeFeed;
use watchpost_triage::{MemoryStore, TriageConfig};

use crate::error::CliError;

/// Snapshot file name inside `general.data_dir`.
pub const STATE_FILE: &str = "state.json";

pub struct AppContext {
    pub config: WatchpostConfig,
    pub triage: TriageConfig,
    pub store: Arc<MemoryStore>,
    state_path: PathBuf,
}

impl AppContext {
    pub async fn open(config: WatchpostConfig) -> Result<Self, CliError> {
        let triage = TriageConfig::from_core(&config)?;
        let state_path = Path::new(&config.general.data_dir).join(STATE_FILE);
        let feed = ChangeFeed::new(config.notifier.channel_capacity);
        let store = MemoryStore::open(&state_path, feed).await?;
        tracing::debug!(path = %state_path.display(), "state loaded");
        Ok(Self {
            config,
            triage,
            store: Arc::new(store),
            state_path,
        })
    }

    /// Operator identity for audited actions, if configured.
    pub fn operator(&self) -> Option<&str> {
        self.config.general.operator()
    }

    /// Writes the store back to the state file.
    pub async fn persist(&self) -> Result<(), CliError> {
        self.store.save(&self.state_path).await?;
        Ok(())
    }
}
