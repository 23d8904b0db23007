use std::path::{Path, PathBuf};

use crate::types::UnitName;

pub const SETTINGS_DIR: &str = ".relctl";
pub const SETTINGS_FILE: &str = "agent.yaml";
pub const CHARM_METADATA_FILE: &str = "metadata.yaml";

/// `<home>/.relctl/agent.yaml`
pub fn settings_path(home: &Path) -> PathBuf {
    home.join(SETTINGS_DIR).join(SETTINGS_FILE)
}

/// `<data_dir>/relations/`
pub fn state_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("relations")
}

/// `<data_dir>/relations/<app>-<n>.json`: pure, no I/O.
pub fn state_path(data_dir: &Path, unit: &UnitName) -> PathBuf {
    state_dir(data_dir).join(format!("{}.json", unit.file_stem()))
}

/// `<data_dir>/charm/`
pub fn default_charm_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("charm")
}

/// `<charm_dir>/metadata.yaml`
pub fn charm_metadata_path(charm_dir: &Path) -> PathBuf {
    charm_dir.join(CHARM_METADATA_FILE)
}
