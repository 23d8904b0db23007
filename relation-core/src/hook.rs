//! Hook kinds and the descriptor passed between the tracker and its control loop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HookError;
use crate::types::{RelationId, UnitName};

/// Every hook the unit agent may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookKind {
    Install,
    Start,
    ConfigChanged,
    UpgradeCharm,
    UpdateStatus,
    LeaderElected,
    LeaderSettingsChanged,
    Stop,
    Remove,
    RelationCreated,
    RelationJoined,
    RelationChanged,
    RelationDeparted,
    RelationBroken,
}

impl HookKind {
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            HookKind::RelationCreated
                | HookKind::RelationJoined
                | HookKind::RelationChanged
                | HookKind::RelationDeparted
                | HookKind::RelationBroken
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Install => "install",
            HookKind::Start => "start",
            HookKind::ConfigChanged => "config-changed",
            HookKind::UpgradeCharm => "upgrade-charm",
            HookKind::UpdateStatus => "update-status",
            HookKind::LeaderElected => "leader-elected",
            HookKind::LeaderSettingsChanged => "leader-settings-changed",
            HookKind::Stop => "stop",
            HookKind::Remove => "remove",
            HookKind::RelationCreated => "relation-created",
            HookKind::RelationJoined => "relation-joined",
            HookKind::RelationChanged => "relation-changed",
            HookKind::RelationDeparted => "relation-departed",
            HookKind::RelationBroken => "relation-broken",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes one hook firing.
///
/// Relation hooks carry the relation id; joined/changed/departed additionally
/// carry the remote unit (or, for application settings changes, only the
/// remote application) and the settings version being delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInfo {
    pub kind: HookKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<RelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_unit: Option<UnitName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_application: Option<String>,
    #[serde(default)]
    pub change_version: i64,
}

impl HookInfo {
    /// A hook that is not tied to any relation.
    pub fn unit(kind: HookKind) -> Self {
        Self {
            kind,
            relation_id: None,
            remote_unit: None,
            remote_application: None,
            change_version: 0,
        }
    }

    /// A relation hook with no remote counterpart yet (created, broken).
    pub fn relation(kind: HookKind, id: RelationId) -> Self {
        Self {
            relation_id: Some(id),
            ..Self::unit(kind)
        }
    }

    /// Names the remote unit; the remote application is derived from it when
    /// the unit name is well formed.
    pub fn with_remote_unit(mut self, unit: impl Into<UnitName>, version: i64) -> Self {
        let unit = unit.into();
        self.remote_application = unit.application().ok().map(str::to_owned);
        self.remote_unit = Some(unit);
        self.change_version = version;
        self
    }

    /// Application settings change with no specific remote unit.
    pub fn with_remote_application(mut self, app: impl Into<String>, version: i64) -> Self {
        self.remote_unit = None;
        self.remote_application = Some(app.into());
        self.change_version = version;
        self
    }

    /// Check the descriptor carries what its kind requires.
    pub fn validate(&self) -> Result<(), HookError> {
        let kind = self.kind;
        if !kind.is_relation() {
            if self.relation_id.is_some() {
                return Err(HookError::UnexpectedRelation { kind });
            }
            return Ok(());
        }
        if self.relation_id.is_none() {
            return Err(HookError::MissingRelationId { kind });
        }
        match kind {
            HookKind::RelationJoined | HookKind::RelationDeparted if self.remote_unit.is_none() => {
                Err(HookError::MissingRemoteUnit { kind })
            }
            HookKind::RelationChanged
                if self.remote_unit.is_none() && self.remote_application.is_none() =>
            {
                Err(HookError::MissingRemote { kind })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for HookInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(id) = self.relation_id {
            write!(f, " (relation {id}")?;
            match (&self.remote_unit, &self.remote_application) {
                (Some(unit), _) => write!(f, ", unit {unit}")?,
                (None, Some(app)) => write!(f, ", application {app}")?,
                (None, None) => {}
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
