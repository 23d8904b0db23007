//! Document stores backing [`crate::StateManager`].
//!
//! [`FileStore`] persists every document in one JSON file,
//! `<data_dir>/relations/<app>-<n>.json`. A transaction is applied to a
//! working copy, and the file is only replaced once every assertion held.
//! Writes use the `.tmp` + rename pattern, so a crash mid-write leaves the
//! previous file intact.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, StoreError};
use crate::txn::{apply, TxnOp};

/// Something that can run assertion-guarded transactions over JSON documents.
pub trait DocumentStore: fmt::Debug + Send + Sync {
    fn load_all(&self) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Apply `ops` atomically; returns [`StoreError::Aborted`] without
    /// writing anything if an assertion fails.
    fn run_transaction(&self, ops: &[TxnOp]) -> Result<(), StoreError>;
}

/// In-process store, used by tests and by callers that do not need
/// durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl DocumentStore for MemoryStore {
    fn load_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        Ok(self.docs.lock().clone())
    }

    fn run_transaction(&self, ops: &[TxnOp]) -> Result<(), StoreError> {
        let mut docs = self.docs.lock();
        let mut working = docs.clone();
        apply(&mut working, ops)?;
        *docs = working;
        Ok(())
    }
}

pub const STORE_FORMAT_VERSION: u32 = 1;

/// On-disk payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreFile {
    pub version: u32,
    pub documents: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreFileCompat {
    Versioned(StoreFile),
    Bare(BTreeMap<String, Value>),
}

/// Durable single-file JSON store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        let parsed: StoreFileCompat =
            serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(match parsed {
            StoreFileCompat::Versioned(file) => file.documents,
            StoreFileCompat::Bare(documents) => documents,
        })
    }

    fn write(&self, documents: BTreeMap<String, Value>) -> Result<(), StoreError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid relation store path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let file = StoreFile {
            version: STORE_FORMAT_VERSION,
            documents,
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| io_err(&tmp, e))?;
        }

        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn load_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let _guard = self.lock.lock();
        self.read()
    }

    fn run_transaction(&self, ops: &[TxnOp]) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut working = self.read()?;
        apply(&mut working, ops)?;
        self.write(working)
    }
}
