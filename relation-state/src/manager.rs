//! Durable store of every relation the unit has joined.
//!
//! [`StateManager`] keeps an in-memory cache in front of a
//! [`DocumentStore`]. The cache changes only after the corresponding
//! transaction commits, so a failed write never leaves the cache ahead of
//! disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use relation_core::settings::DEFAULT_MAX_TXN_ATTEMPTS;
use relation_core::RelationId;

use crate::error::StateError;
use crate::state::{doc_id, RelationState};
use crate::store::DocumentStore;
use crate::txn::{TxnOp, TxnRunner};

const DOC_PREFIX: &str = "relation-";

#[derive(Debug)]
pub struct StateManager {
    store: Arc<dyn DocumentStore>,
    max_attempts: usize,
    relations: Mutex<BTreeMap<RelationId, RelationState>>,
}

impl StateManager {
    /// Load every persisted relation record from `store`.
    ///
    /// Documents that do not belong to a relation are ignored; a relation
    /// document that fails to parse is an error.
    pub fn new(store: Arc<dyn DocumentStore>) -> Result<Self, StateError> {
        let mut relations = BTreeMap::new();
        for (id, doc) in store.load_all()? {
            if !id.starts_with(DOC_PREFIX) {
                debug!(doc = %id, "ignoring non-relation document");
                continue;
            }
            let st: RelationState = serde_json::from_value(doc)?;
            if st.doc_id() != id {
                warn!(doc = %id, relation = %st.relation_id, "relation document stored under wrong id");
            }
            relations.insert(st.relation_id, st);
        }
        Ok(Self {
            store,
            max_attempts: DEFAULT_MAX_TXN_ATTEMPTS,
            relations: Mutex::new(relations),
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Ids of every persisted relation, ascending.
    pub fn known_ids(&self) -> Vec<RelationId> {
        self.relations.lock().keys().copied().collect()
    }

    pub fn relation_found(&self, id: RelationId) -> bool {
        self.relations.lock().contains_key(&id)
    }

    pub fn relation(&self, id: RelationId) -> Result<RelationState, StateError> {
        self.relations
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StateError::NotFound(id))
    }

    /// Persist `st`, replacing any earlier record for the same relation.
    ///
    /// The first attempt inserts asserting absence. If that aborts because a
    /// record is already there (including one left by an earlier attempt
    /// that crashed after committing), the next attempt removes it asserting
    /// existence and reinserts in the same transaction.
    pub fn set_relation(&self, st: &RelationState) -> Result<(), StateError> {
        let id = st.doc_id();
        let doc = serde_json::to_value(st)?;
        TxnRunner::new(self.store.as_ref(), self.max_attempts).run(|attempt| {
            Ok(if attempt % 2 == 0 {
                vec![TxnOp::insert(&id, doc.clone())]
            } else {
                vec![TxnOp::remove(&id), TxnOp::insert(&id, doc.clone())]
            })
        })?;
        self.relations.lock().insert(st.relation_id, st.clone());
        Ok(())
    }

    /// Purge the record for `id`. Removing a relation that is already gone
    /// succeeds.
    pub fn remove_relation(&self, id: RelationId) -> Result<(), StateError> {
        let doc = doc_id(id);
        TxnRunner::new(self.store.as_ref(), self.max_attempts).run(|attempt| {
            Ok(if attempt == 0 {
                vec![TxnOp::remove(&doc)]
            } else {
                Vec::new()
            })
        })?;
        self.relations.lock().remove(&id);
        Ok(())
    }
}
