//! Domain types for relations, units and remote snapshots.
//!
//! All types are serializable via serde; newtypes serialize transparently so
//! they can be used as JSON map keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NameError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable relation identifier assigned by the controller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RelationId(pub i64);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for RelationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A unit name of the form `<application>/<number>`, e.g. `mysql/0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitName(pub String);

impl UnitName {
    /// The application part of the unit name.
    pub fn application(&self) -> Result<&str, NameError> {
        let invalid = || NameError(self.0.clone());
        let (app, number) = self.0.split_once('/').ok_or_else(invalid)?;
        if app.is_empty() || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        Ok(app)
    }

    /// Filesystem-safe form: `mysql/0` → `mysql-0`.
    pub fn file_stem(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UnitName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UnitName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Controller key naming a relation, e.g. `wordpress:db mysql:server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationKey(pub String);

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RelationKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RelationKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle value of a controller entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

impl fmt::Display for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Life::Alive => write!(f, "alive"),
            Life::Dying => write!(f, "dying"),
            Life::Dead => write!(f, "dead"),
        }
    }
}

/// Role an endpoint plays in a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Provider,
    Requirer,
    Peer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Provider => write!(f, "provider"),
            Role::Requirer => write!(f, "requirer"),
            Role::Peer => write!(f, "peer"),
        }
    }
}

/// Which units are considered members of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Global,
    /// Only co-located principal/subordinate pairs.
    Container,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Container => write!(f, "container"),
        }
    }
}

/// Externally visible relation status, written by the leader only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationStatusValue {
    Joining,
    Joined,
    Suspending,
    Suspended,
    Broken,
    Error,
}

impl fmt::Display for RelationStatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationStatusValue::Joining => "joining",
            RelationStatusValue::Joined => "joined",
            RelationStatusValue::Suspending => "suspending",
            RelationStatusValue::Suspended => "suspended",
            RelationStatusValue::Broken => "broken",
            RelationStatusValue::Error => "error",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One side of a relation as seen by the local unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub application_name: String,
    pub name: String,
    pub interface: String,
    pub role: Role,
    #[serde(default)]
    pub scope: Scope,
}

impl Endpoint {
    /// Implicit endpoints are wired by the platform for every charm and never
    /// fire relation-broken.
    pub fn is_implicit(&self) -> bool {
        self.name == "juju-info" && self.interface == "juju-info" && self.role == Role::Provider
    }
}

/// One entry of the startup relation-status listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationStatus {
    pub key: RelationKey,
    pub in_scope: bool,
    pub suspended: bool,
}

/// Remote view of a single relation for one reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationSnapshot {
    pub life: Life,
    #[serde(default)]
    pub suspended: bool,
    /// Remote unit → latest settings change version.
    #[serde(default)]
    pub members: BTreeMap<UnitName, i64>,
    /// Remote application → latest application settings change version.
    #[serde(default)]
    pub application_members: BTreeMap<String, i64>,
}

/// Remote state delivered by the watcher for one reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    #[serde(default)]
    pub relations: BTreeMap<RelationId, RelationSnapshot>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
