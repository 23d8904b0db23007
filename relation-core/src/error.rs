//! Error types for relation-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::hook::HookKind;

/// A unit name that does not have the `<application>/<number>` shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid unit name {0:?}")]
pub struct NameError(pub String);

/// Failures reported by the controller API boundary.
///
/// The two scope variants are classified by the controller; this crate does
/// not infer anything beyond "retry later" versus "give up on this relation".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The unit can never enter this relation's scope.
    #[error("cannot enter scope: {0}")]
    CannotEnterScope(String),

    /// The unit cannot enter scope right now (e.g. a departing subordinate
    /// still occupies the container); a later attempt may succeed.
    #[error("cannot enter scope yet: {0}")]
    CannotEnterScopeYet(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Unauthorized(String),

    #[error("watcher stopped: {0}")]
    WatcherStopped(String),

    #[error("controller error: {0}")]
    Other(String),
}

impl ApiError {
    /// True for lookups that should be read as "no longer visible to this unit".
    pub fn is_not_found_or_unauthorized(&self) -> bool {
        matches!(self, ApiError::NotFound(_) | ApiError::Unauthorized(_))
    }
}

/// A hook descriptor that is missing data required by its kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("\"{kind}\" hook requires a relation id")]
    MissingRelationId { kind: HookKind },

    #[error("\"{kind}\" hook requires a remote unit")]
    MissingRemoteUnit { kind: HookKind },

    #[error("\"{kind}\" hook requires a remote unit or application")]
    MissingRemote { kind: HookKind },

    #[error("\"{kind}\" hook must not name a relation")]
    UnexpectedRelation { kind: HookKind },
}

/// Failures reading charm metadata from disk.
#[derive(Debug, Error)]
pub enum CharmError {
    #[error("charm metadata not found at {path}")]
    NotFound { path: PathBuf },

    #[error("failed to parse charm metadata at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures loading or saving agent settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Includes file path and line context from serde_yaml.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("settings not found at {path}")]
    NotFound { path: PathBuf },

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn settings_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn charm_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CharmError {
    CharmError::Io {
        path: path.into(),
        source,
    }
}
