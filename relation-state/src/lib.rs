//! Relation state: what the unit has already observed of each relation,
//! persisted with assertion-guarded transactions.
//!
//! - [`state`]: [`RelationState`] and hook validation against it
//! - [`txn`]: transaction ops and the retrying [`TxnRunner`]
//! - [`store`]: [`DocumentStore`] with memory and atomic-file backends
//! - [`manager`]: [`StateManager`], the cached view the tracker uses

pub mod error;
pub mod manager;
pub mod state;
pub mod store;
pub mod txn;

pub use error::{Rejection, StateError, StoreError};
pub use manager::StateManager;
pub use state::RelationState;
pub use store::{DocumentStore, FileStore, MemoryStore};
pub use txn::{Assert, TxnOp, TxnRunner};
