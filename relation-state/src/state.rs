//! Persisted per-relation membership record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use relation_core::{HookInfo, HookKind, RelationId, UnitName};

use crate::error::{Rejection, StateError};

/// Document id under which a relation's record is stored.
pub fn doc_id(id: RelationId) -> String {
    format!("relation-{id}")
}

/// What the local unit has already observed of one relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationState {
    pub relation_id: RelationId,
    /// Remote unit → last settings version delivered to a hook.
    #[serde(default)]
    pub members: BTreeMap<UnitName, i64>,
    /// Remote application → last application settings version delivered.
    #[serde(default)]
    pub application_members: BTreeMap<String, i64>,
    /// Unit that joined but has not yet had its first relation-changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_pending: Option<UnitName>,
    /// relation-created has fired for this relation.
    #[serde(default)]
    pub created: bool,
}

impl RelationState {
    pub fn new(relation_id: RelationId) -> Self {
        Self {
            relation_id,
            members: BTreeMap::new(),
            application_members: BTreeMap::new(),
            changed_pending: None,
            created: false,
        }
    }

    pub fn doc_id(&self) -> String {
        doc_id(self.relation_id)
    }

    /// Check that `info` is the right next hook given what has already been
    /// observed.
    ///
    /// A relation-changed whose version was already delivered, and a
    /// relation-departed for a unit that is no longer a member, are rejected
    /// with errors for which [`StateError::is_no_op`] holds.
    pub fn validate(&self, info: &HookInfo) -> Result<(), StateError> {
        info.validate()?;
        let kind = info.kind;
        let target = match (&info.remote_unit, &info.remote_application) {
            (Some(unit), _) => unit.to_string(),
            (None, Some(app)) => app.clone(),
            (None, None) => format!("relation {}", self.relation_id),
        };
        let reject = |rejection| {
            Err(StateError::InvalidHook {
                kind,
                target: target.clone(),
                rejection,
            })
        };

        if let Some(actual) = info.relation_id {
            if actual != self.relation_id {
                return reject(Rejection::WrongRelation {
                    expected: self.relation_id,
                    actual,
                });
            }
        }

        match kind {
            HookKind::RelationCreated if self.created => return reject(Rejection::AlreadyCreated),
            HookKind::RelationCreated => return Ok(()),
            HookKind::RelationBroken if !self.members.is_empty() => {
                return reject(Rejection::MembersRemain)
            }
            HookKind::RelationBroken => return Ok(()),
            _ => {}
        }

        let Some(unit) = &info.remote_unit else {
            // Application settings change.
            if let Some(pending) = &self.changed_pending {
                return reject(Rejection::ChangePending(pending.clone()));
            }
            let app = info.remote_application.as_deref().unwrap_or_default();
            if self.application_members.get(app) == Some(&info.change_version) {
                return reject(Rejection::AlreadyObserved(info.change_version));
            }
            return Ok(());
        };

        if let Some(pending) = &self.changed_pending {
            if unit != pending || kind != HookKind::RelationChanged {
                return reject(Rejection::ChangePending(pending.clone()));
            }
            return Ok(());
        }

        match (kind, self.members.get(unit)) {
            (HookKind::RelationJoined, Some(_)) => reject(Rejection::AlreadyJoined),
            (HookKind::RelationJoined, None) => Ok(()),
            (HookKind::RelationDeparted, None) => reject(Rejection::AlreadyDeparted),
            (_, None) => reject(Rejection::NotJoined),
            (HookKind::RelationChanged, Some(&seen)) if seen == info.change_version => {
                reject(Rejection::AlreadyObserved(seen))
            }
            _ => Ok(()),
        }
    }

    /// Record the effect of a successfully executed hook.
    pub fn update_for_hook(&mut self, info: &HookInfo) {
        match info.kind {
            HookKind::RelationCreated => self.created = true,
            HookKind::RelationJoined => {
                if let Some(unit) = &info.remote_unit {
                    self.members.insert(unit.clone(), info.change_version);
                    self.changed_pending = Some(unit.clone());
                }
            }
            HookKind::RelationChanged => match (&info.remote_unit, &info.remote_application) {
                (Some(unit), _) => {
                    self.members.insert(unit.clone(), info.change_version);
                    if self.changed_pending.as_ref() == Some(unit) {
                        self.changed_pending = None;
                    }
                }
                (None, Some(app)) => {
                    self.application_members
                        .insert(app.clone(), info.change_version);
                }
                (None, None) => {}
            },
            HookKind::RelationDeparted => {
                if let Some(unit) = &info.remote_unit {
                    self.members.remove(unit);
                    if self.changed_pending.as_ref() == Some(unit) {
                        self.changed_pending = None;
                    }
                }
            }
            _ => {}
        }
    }
}
