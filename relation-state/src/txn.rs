//! Assertion-guarded document transactions.
//!
//! A transaction is a list of [`TxnOp`]s applied all-or-nothing: every
//! assertion is checked against a working copy of the documents as the ops
//! run in order, and the store only commits the copy when all of them hold.
//! [`TxnRunner`] rebuilds and reruns a transaction after an abort, which is
//! how callers get compare-and-swap semantics without holding a lock across
//! the read and the write.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::store::DocumentStore;

/// Precondition on a document, checked when the op is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assert {
    None,
    DocExists,
    DocMissing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TxnAction {
    /// Create the document; aborts if it already exists.
    Insert(Value),
    /// Delete the document; a missing document is left missing.
    Remove,
    /// Assertion only.
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxnOp {
    pub doc_id: String,
    pub assert: Assert,
    pub action: TxnAction,
}

impl TxnOp {
    pub fn insert(doc_id: impl Into<String>, doc: Value) -> Self {
        Self {
            doc_id: doc_id.into(),
            assert: Assert::DocMissing,
            action: TxnAction::Insert(doc),
        }
    }

    pub fn remove(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            assert: Assert::DocExists,
            action: TxnAction::Remove,
        }
    }

    pub fn assert(doc_id: impl Into<String>, assert: Assert) -> Self {
        Self {
            doc_id: doc_id.into(),
            assert,
            action: TxnAction::None,
        }
    }
}

/// Apply `ops` in order to `docs`.
///
/// On error `docs` may be partially modified; callers pass a working copy
/// and discard it on failure.
pub fn apply(docs: &mut BTreeMap<String, Value>, ops: &[TxnOp]) -> Result<(), StoreError> {
    for op in ops {
        let exists = docs.contains_key(&op.doc_id);
        let holds = match op.assert {
            Assert::None => true,
            Assert::DocExists => exists,
            Assert::DocMissing => !exists,
        };
        if !holds {
            return Err(StoreError::Aborted {
                doc_id: op.doc_id.clone(),
            });
        }
        match &op.action {
            TxnAction::Insert(doc) => {
                if docs.contains_key(&op.doc_id) {
                    return Err(StoreError::Aborted {
                        doc_id: op.doc_id.clone(),
                    });
                }
                docs.insert(op.doc_id.clone(), doc.clone());
            }
            TxnAction::Remove => {
                docs.remove(&op.doc_id);
            }
            TxnAction::None => {}
        }
    }
    Ok(())
}

/// Runs a transaction built per attempt until it commits.
pub struct TxnRunner<'a> {
    store: &'a dyn DocumentStore,
    max_attempts: usize,
}

impl<'a> TxnRunner<'a> {
    pub fn new(store: &'a dyn DocumentStore, max_attempts: usize) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Call `build(attempt)` for attempts `0..max_attempts` and run what it
    /// returns. An empty op list means there is nothing left to do.
    pub fn run<F>(&self, mut build: F) -> Result<(), StoreError>
    where
        F: FnMut(usize) -> Result<Vec<TxnOp>, StoreError>,
    {
        for attempt in 0..self.max_attempts {
            let ops = build(attempt)?;
            if ops.is_empty() {
                return Ok(());
            }
            match self.store.run_transaction(&ops) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_aborted() => {
                    debug!(attempt, error = %err, "transaction aborted, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::ExcessiveContention {
            attempts: self.max_attempts,
        })
    }
}
