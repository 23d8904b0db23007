pub mod endpoints;
pub mod known;
pub mod purge;
pub mod show;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use relation_core::{settings, AgentSettings};
use relation_state::{FileStore, StateManager};

/// Load settings from `config`, or from `~/.relctl/agent.yaml`.
pub fn load_settings(config: Option<&Path>) -> Result<AgentSettings> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => settings::default_path().context("failed to locate agent settings")?,
    };
    settings::load_at(&path).with_context(|| format!("failed to load {}", path.display()))
}

/// Open the unit's relation store read-write.
pub fn open_state(settings: &AgentSettings) -> Result<StateManager> {
    let path = settings.state_path();
    let store = Arc::new(FileStore::new(&path));
    let manager = StateManager::new(store)
        .with_context(|| format!("failed to read relation state at {}", path.display()))?;
    Ok(manager.with_max_attempts(settings.max_txn_attempts))
}
