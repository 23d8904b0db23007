use thiserror::Error;

use relation_core::{ApiError, CharmError, HookError, HookKind, NameError, RelationId, RelationKey};
use relation_state::StateError;

/// Error surface for relation tracking and hook sequencing.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The abort signal fired while waiting to join a relation.
    #[error("relation state tracker loop aborted")]
    LoopAborted,

    #[error("controller error: {0}")]
    Api(#[from] ApiError),

    #[error("relation state error: {0}")]
    State(#[from] StateError),

    #[error("charm metadata error: {0}")]
    Charm(#[from] CharmError),

    #[error("{0}")]
    Name(#[from] NameError),

    #[error("invalid hook: {0}")]
    Hook(#[from] HookError),

    #[error("unknown relation: {0}")]
    UnknownRelation(RelationId),

    #[error("not a relation hook: {0}")]
    NotRelationHook(HookKind),

    #[error("implicit relation {0} does not run hooks")]
    ImplicitRelation(RelationId),

    #[error("dying relationer for relation {0} must not join")]
    DyingJoin(RelationId),

    #[error("unit watcher closed")]
    WatcherClosed,

    #[error("leaving scope of relation {relation}: {source}")]
    LeaveScope {
        relation: RelationKey,
        #[source]
        source: ApiError,
    },
}

impl TrackerError {
    pub fn is_loop_aborted(&self) -> bool {
        matches!(self, TrackerError::LoopAborted)
    }

    /// The controller will never let the unit into this relation's scope.
    pub fn is_cannot_enter_scope(&self) -> bool {
        matches!(self, TrackerError::Api(ApiError::CannotEnterScope(_)))
    }

    /// Scope entry may succeed on a later attempt.
    pub fn is_cannot_enter_scope_yet(&self) -> bool {
        matches!(self, TrackerError::Api(ApiError::CannotEnterScopeYet(_)))
    }
}
