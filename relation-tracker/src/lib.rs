//! Relation lifecycle tracking for a unit agent.
//!
//! [`RelationStateTracker`] reconciles remote snapshots with the relations
//! the unit has joined; each joined relation is sequenced by a
//! [`Relationer`] that persists progress through
//! [`relation_state::StateManager`].

pub mod api;
mod error;
pub mod relationer;
pub mod tracker;
pub mod watcher;

#[cfg(test)]
mod fakes;

pub use api::{LeadershipContext, NotifyWatcher, Relation, RelationUnit, StateTrackerState, Unit};
pub use error::TrackerError;
pub use relationer::{
    unit_relationer_factory, NewRelationerFn, RelationInfo, Relationer, UnitRelationer,
};
pub use tracker::{RelationStateTracker, TrackerConfig};
pub use watcher::ChannelWatcher;
