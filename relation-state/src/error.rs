//! Error types for relation-state.

use std::path::PathBuf;

use thiserror::Error;

use relation_core::{HookError, HookKind, RelationId, UnitName};

/// Errors from the document store and its transaction runner.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An assertion in the transaction did not hold; nothing was written.
    #[error("transaction aborted: assertion failed on {doc_id}")]
    Aborted { doc_id: String },

    /// Every attempt of a transaction was aborted.
    #[error("transaction gave up after {attempts} attempt(s): excessive contention")]
    ExcessiveContention { attempts: usize },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but does not hold a valid document map.
    #[error("corrupt relation store at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, StoreError::Aborted { .. })
    }
}

/// Why a hook cannot be applied to the persisted relation state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("expected relation {expected}, got relation {actual}")]
    WrongRelation {
        expected: RelationId,
        actual: RelationId,
    },

    #[error("\"relation-created\" already fired")]
    AlreadyCreated,

    #[error("cannot run \"relation-broken\" while units still present")]
    MembersRemain,

    #[error("expected \"relation-changed\" for {0}")]
    ChangePending(UnitName),

    #[error("unit already joined")]
    AlreadyJoined,

    #[error("unit has not joined")]
    NotJoined,

    #[error("unit already departed")]
    AlreadyDeparted,

    #[error("settings version {0} already observed")]
    AlreadyObserved(i64),
}

/// Errors from persisted relation state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("relation {0} not found")]
    NotFound(RelationId),

    #[error("inappropriate \"{kind}\" for {target}: {rejection}")]
    InvalidHook {
        kind: HookKind,
        target: String,
        #[source]
        rejection: Rejection,
    },

    #[error("hook error: {0}")]
    Hook(#[from] HookError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("relation state JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StateError {
    /// The hook would re-deliver an event the unit has already seen; the
    /// caller should skip it rather than fail.
    pub fn is_no_op(&self) -> bool {
        matches!(
            self,
            StateError::InvalidHook {
                rejection: Rejection::AlreadyObserved(_) | Rejection::AlreadyDeparted,
                ..
            }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
