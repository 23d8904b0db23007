//! Charm endpoint metadata and the reader used to check that a relation's
//! endpoint is still implemented by the unit's current charm.
//!
//! `metadata.yaml` relation maps accept either the full form
//! (`db: {interface: mysql, scope: container}`) or the short form
//! (`db: mysql`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{charm_io_err, CharmError};
use crate::paths::charm_metadata_path;
use crate::types::{Endpoint, Role, Scope};

/// A relation declared by a charm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmRelation {
    pub interface: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CharmRelationCompat {
    Interface(String),
    Full(CharmRelation),
}

impl From<CharmRelationCompat> for CharmRelation {
    fn from(compat: CharmRelationCompat) -> Self {
        match compat {
            CharmRelationCompat::Interface(interface) => CharmRelation {
                interface,
                scope: Scope::Global,
                limit: None,
                optional: false,
            },
            CharmRelationCompat::Full(relation) => relation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CharmMetaFile {
    name: String,
    #[serde(default)]
    subordinate: bool,
    #[serde(default)]
    provides: BTreeMap<String, CharmRelationCompat>,
    #[serde(default)]
    requires: BTreeMap<String, CharmRelationCompat>,
    #[serde(default)]
    peers: BTreeMap<String, CharmRelationCompat>,
}

/// Relation-relevant subset of a charm's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharmMeta {
    pub name: String,
    pub subordinate: bool,
    pub provides: BTreeMap<String, CharmRelation>,
    pub requires: BTreeMap<String, CharmRelation>,
    pub peers: BTreeMap<String, CharmRelation>,
}

impl CharmMeta {
    /// Parse `metadata.yaml` contents. `path` is only used for error context.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, CharmError> {
        let file: CharmMetaFile =
            serde_yaml::from_str(contents).map_err(|source| CharmError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let convert = |m: BTreeMap<String, CharmRelationCompat>| {
            m.into_iter()
                .map(|(name, rel)| (name, CharmRelation::from(rel)))
                .collect::<BTreeMap<_, _>>()
        };
        Ok(Self {
            name: file.name,
            subordinate: file.subordinate,
            provides: convert(file.provides),
            requires: convert(file.requires),
            peers: convert(file.peers),
        })
    }

    pub fn relations(&self, role: Role) -> &BTreeMap<String, CharmRelation> {
        match role {
            Role::Provider => &self.provides,
            Role::Requirer => &self.requires,
            Role::Peer => &self.peers,
        }
    }

    /// All declared endpoints, ordered by role then name.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        [Role::Provider, Role::Requirer, Role::Peer]
            .into_iter()
            .flat_map(|role| {
                self.relations(role).iter().map(move |(name, rel)| Endpoint {
                    application_name: self.name.clone(),
                    name: name.clone(),
                    interface: rel.interface.clone(),
                    role,
                    scope: rel.scope,
                })
            })
            .collect()
    }
}

impl Endpoint {
    /// Whether the charm still declares this endpoint.
    ///
    /// Implicit endpoints are implemented by every charm. Otherwise the
    /// charm must declare the name under the same role with the same
    /// interface; a global endpoint is not satisfied by a container-scoped
    /// declaration.
    pub fn implemented_by(&self, meta: &CharmMeta) -> bool {
        if self.is_implicit() {
            return true;
        }
        let Some(declared) = meta.relations(self.role).get(&self.name) else {
            return false;
        };
        if declared.interface != self.interface {
            return false;
        }
        match self.scope {
            Scope::Global => declared.scope != Scope::Container,
            Scope::Container => true,
        }
    }
}

/// Source of the unit's current charm metadata.
pub trait CharmReader: Send + Sync {
    fn read(&self) -> Result<CharmMeta, CharmError>;
}

/// Reads `metadata.yaml` from an unpacked charm directory.
#[derive(Debug, Clone)]
pub struct CharmDirReader {
    dir: PathBuf,
}

impl CharmDirReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CharmReader for CharmDirReader {
    fn read(&self) -> Result<CharmMeta, CharmError> {
        let path = charm_metadata_path(&self.dir);
        if !path.exists() {
            return Err(CharmError::NotFound { path });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| charm_io_err(&path, e))?;
        CharmMeta::parse(&contents, &path)
    }
}
