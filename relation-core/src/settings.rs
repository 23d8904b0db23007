//! Agent settings file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.relctl/
//!   agent.yaml      (mode 0600)
//! ```
//!
//! # API pattern
//!
//! `load_at(path)` / `save_at(path, …)` take an explicit file path and are
//! what tests use with `TempDir`; `default_path()` derives
//! `~/.relctl/agent.yaml` from `dirs::home_dir()`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{settings_io_err, SettingsError};
use crate::paths::{default_charm_dir, settings_path, state_path};
use crate::types::UnitName;

/// Default number of attempts for an assertion-guarded write.
pub const DEFAULT_MAX_TXN_ATTEMPTS: usize = 3;

fn default_max_txn_attempts() -> usize {
    DEFAULT_MAX_TXN_ATTEMPTS
}

/// Per-unit agent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// The local unit, e.g. `wordpress/0`.
    pub unit: UnitName,
    /// Root of the agent's durable state.
    pub data_dir: PathBuf,
    /// Unpacked charm; defaults to `<data_dir>/charm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charm_dir: Option<PathBuf>,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(default = "default_max_txn_attempts")]
    pub max_txn_attempts: usize,
}

impl AgentSettings {
    pub fn new(unit: impl Into<UnitName>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            unit: unit.into(),
            data_dir: data_dir.into(),
            charm_dir: None,
            log_filter: None,
            max_txn_attempts: DEFAULT_MAX_TXN_ATTEMPTS,
        }
    }

    pub fn charm_dir(&self) -> PathBuf {
        self.charm_dir
            .clone()
            .unwrap_or_else(|| default_charm_dir(&self.data_dir))
    }

    pub fn state_path(&self) -> PathBuf {
        state_path(&self.data_dir, &self.unit)
    }

    /// Reject settings that would make the agent misbehave later.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.unit
            .application()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        if self.max_txn_attempts == 0 {
            return Err(SettingsError::Invalid(
                "max_txn_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// `~/.relctl/agent.yaml`
pub fn default_path() -> Result<PathBuf, SettingsError> {
    let home = dirs::home_dir().ok_or(SettingsError::HomeNotFound)?;
    Ok(settings_path(&home))
}

/// Load and validate settings from `path`.
///
/// Returns `SettingsError::NotFound` if absent,
/// `SettingsError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<AgentSettings, SettingsError> {
    if !path.exists() {
        return Err(SettingsError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| settings_io_err(path, e))?;
    let settings: AgentSettings =
        serde_yaml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}

/// Atomically save settings to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(path: &Path, settings: &AgentSettings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| settings_io_err(dir, e))?;
    }
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp, yaml).map_err(|e| settings_io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| settings_io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| settings_io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_fill_optional_fields() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("agent.yaml");
        std::fs::write(&path, "unit: mysql/0\ndata_dir: /var/lib/agent\n").expect("write");

        let settings = load_at(&path).expect("load");
        assert_eq!(settings.max_txn_attempts, DEFAULT_MAX_TXN_ATTEMPTS);
        assert_eq!(settings.charm_dir(), PathBuf::from("/var/lib/agent/charm"));
        assert_eq!(
            settings.state_path(),
            PathBuf::from("/var/lib/agent/relations/mysql-0.json")
        );
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("nested").join("agent.yaml");
        let mut settings = AgentSettings::new("wordpress/3", tmp.path());
        settings.log_filter = Some("debug".to_string());

        save_at(&path, &settings).expect("save");
        assert_eq!(load_at(&path).expect("load"), settings);
        assert!(!path.with_extension("yaml.tmp").exists());
    }

    #[test]
    fn rejects_bad_unit_name() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("agent.yaml");
        std::fs::write(&path, "unit: mysql\ndata_dir: /tmp\n").expect("write");
        let err = load_at(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)), "got: {err}");
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut settings = AgentSettings::new("mysql/0", "/tmp");
        settings.max_txn_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().expect("tempdir");
        let err = load_at(&tmp.path().join("agent.yaml")).unwrap_err();
        assert!(matches!(err, SettingsError::NotFound { .. }));
    }
}
