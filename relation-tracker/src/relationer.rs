//! Per-relation hook sequencing.
//!
//! A [`Relationer`] owns the local unit's scope membership for one relation
//! and decides which hook is due next by comparing the remote snapshot with
//! the persisted [`RelationState`]. Committing a hook advances that state in
//! one durable write.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use relation_core::{
    Endpoint, HookInfo, HookKind, RelationId, RelationKey, RelationSnapshot, UnitName,
};
use relation_state::{RelationState, StateManager};

use crate::api::RelationUnit;
use crate::error::TrackerError;

/// What hook execution needs to know about a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationInfo {
    pub relation_id: RelationId,
    pub key: RelationKey,
    pub endpoint: Endpoint,
    pub remote_application: String,
    /// Remote units the local unit has seen join, sorted.
    pub member_names: Vec<UnitName>,
}

#[async_trait]
pub trait Relationer: Send + Sync {
    fn relation_unit(&self) -> &Arc<dyn RelationUnit>;

    fn context_info(&self) -> RelationInfo;

    fn is_dying(&self) -> bool;

    fn is_implicit(&self) -> bool;

    /// Restrict further hooks to departures and relation-broken. In-memory
    /// only.
    fn set_dying(&mut self);

    /// Enter scope and make sure a persisted record exists. Safe to repeat.
    async fn join(&self) -> Result<(), TrackerError>;

    /// Leave scope and purge the persisted record.
    async fn die(&self) -> Result<(), TrackerError>;

    /// Validate `info` against persisted state and return the hook name.
    fn prepare_hook(&self, info: &HookInfo) -> Result<String, TrackerError>;

    /// Record that `info` ran successfully.
    async fn commit_hook(&self, info: &HookInfo) -> Result<(), TrackerError>;

    /// The hook due next given the remote view, if any.
    fn next_hook(&self, remote: &RelationSnapshot) -> Result<Option<HookInfo>, TrackerError>;
}

/// Builds the relationer for a newly joined relation.
pub type NewRelationerFn =
    Arc<dyn Fn(Arc<dyn RelationUnit>, Arc<StateManager>) -> Box<dyn Relationer> + Send + Sync>;

/// Factory producing [`UnitRelationer`]s.
pub fn unit_relationer_factory() -> NewRelationerFn {
    Arc::new(
        |ru: Arc<dyn RelationUnit>, state_mgr: Arc<StateManager>| -> Box<dyn Relationer> {
            Box::new(UnitRelationer::new(ru, state_mgr))
        },
    )
}

pub struct UnitRelationer {
    relation_unit: Arc<dyn RelationUnit>,
    state_mgr: Arc<StateManager>,
    relation_id: RelationId,
    dying: bool,
}

impl UnitRelationer {
    pub fn new(relation_unit: Arc<dyn RelationUnit>, state_mgr: Arc<StateManager>) -> Self {
        let relation_id = relation_unit.relation().id();
        Self {
            relation_unit,
            state_mgr,
            relation_id,
            dying: false,
        }
    }

    fn hook(&self, kind: HookKind) -> HookInfo {
        HookInfo::relation(kind, self.relation_id)
    }
}

#[async_trait]
impl Relationer for UnitRelationer {
    fn relation_unit(&self) -> &Arc<dyn RelationUnit> {
        &self.relation_unit
    }

    fn context_info(&self) -> RelationInfo {
        let relation = self.relation_unit.relation();
        let st = match self.state_mgr.relation(self.relation_id) {
            Ok(st) => st,
            Err(err) => {
                tracing::warn!(relation = %self.relation_id, error = %err, "no persisted state, reporting no members");
                RelationState::new(self.relation_id)
            }
        };
        RelationInfo {
            relation_id: self.relation_id,
            key: relation.key(),
            endpoint: self.relation_unit.endpoint(),
            remote_application: relation.other_application(),
            member_names: st.members.into_keys().collect(),
        }
    }

    fn is_dying(&self) -> bool {
        self.dying
    }

    fn is_implicit(&self) -> bool {
        self.relation_unit.endpoint().is_implicit()
    }

    fn set_dying(&mut self) {
        self.dying = true;
    }

    async fn join(&self) -> Result<(), TrackerError> {
        if self.dying {
            return Err(TrackerError::DyingJoin(self.relation_id));
        }
        self.relation_unit.enter_scope().await?;
        if !self.state_mgr.relation_found(self.relation_id) {
            self.state_mgr
                .set_relation(&RelationState::new(self.relation_id))?;
        }
        Ok(())
    }

    async fn die(&self) -> Result<(), TrackerError> {
        match self.relation_unit.leave_scope().await {
            Ok(()) => {}
            Err(err) if err.is_not_found_or_unauthorized() => {
                tracing::debug!(relation = %self.relation_id, error = %err, "relation already gone");
            }
            Err(source) => {
                return Err(TrackerError::LeaveScope {
                    relation: self.relation_unit.relation().key(),
                    source,
                })
            }
        }
        self.state_mgr.remove_relation(self.relation_id)?;
        Ok(())
    }

    fn prepare_hook(&self, info: &HookInfo) -> Result<String, TrackerError> {
        if self.is_implicit() {
            return Err(TrackerError::ImplicitRelation(self.relation_id));
        }
        let st = self.state_mgr.relation(self.relation_id)?;
        st.validate(info)?;
        Ok(format!("{}-{}", self.relation_unit.endpoint().name, info.kind))
    }

    async fn commit_hook(&self, info: &HookInfo) -> Result<(), TrackerError> {
        if self.is_implicit() {
            return Err(TrackerError::ImplicitRelation(self.relation_id));
        }
        if info.kind == HookKind::RelationBroken {
            return self.die().await;
        }
        let mut st = self.state_mgr.relation(self.relation_id)?;
        st.update_for_hook(info);
        self.state_mgr.set_relation(&st)?;
        Ok(())
    }

    fn next_hook(&self, remote: &RelationSnapshot) -> Result<Option<HookInfo>, TrackerError> {
        if self.is_implicit() {
            return Ok(None);
        }
        let st = self.state_mgr.relation(self.relation_id)?;

        if !st.created && !self.dying {
            return Ok(Some(self.hook(HookKind::RelationCreated)));
        }

        if let Some(unit) = &st.changed_pending {
            let version = remote
                .members
                .get(unit)
                .or_else(|| st.members.get(unit))
                .copied()
                .unwrap_or_default();
            return Ok(Some(
                self.hook(HookKind::RelationChanged)
                    .with_remote_unit(unit.clone(), version),
            ));
        }

        let empty: BTreeMap<UnitName, i64> = BTreeMap::new();
        let remote_members = if self.dying { &empty } else { &remote.members };

        if let Some((unit, &version)) = st
            .members
            .iter()
            .find(|(unit, _)| !remote_members.contains_key(*unit))
        {
            return Ok(Some(
                self.hook(HookKind::RelationDeparted)
                    .with_remote_unit(unit.clone(), version),
            ));
        }

        if self.dying {
            return Ok(Some(self.hook(HookKind::RelationBroken)));
        }

        if let Some((unit, &version)) = remote_members
            .iter()
            .find(|(unit, _)| !st.members.contains_key(*unit))
        {
            return Ok(Some(
                self.hook(HookKind::RelationJoined)
                    .with_remote_unit(unit.clone(), version),
            ));
        }

        if let Some((unit, &version)) = remote_members
            .iter()
            .find(|(unit, version)| st.members.get(*unit) != Some(*version))
        {
            return Ok(Some(
                self.hook(HookKind::RelationChanged)
                    .with_remote_unit(unit.clone(), version),
            ));
        }

        if let Some((app, &version)) = remote
            .application_members
            .iter()
            .find(|(app, version)| st.application_members.get(*app) != Some(*version))
        {
            return Ok(Some(
                self.hook(HookKind::RelationChanged)
                    .with_remote_application(app.clone(), version),
            ));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{endpoint, FakeRelation};
    use relation_core::{ApiError, Life, Role, Scope};
    use relation_state::MemoryStore;

    fn setup(ep: Endpoint) -> (FakeRelation, Arc<StateManager>, UnitRelationer) {
        let rel = FakeRelation::new(1, "mysql", ep);
        let state_mgr =
            Arc::new(StateManager::new(Arc::new(MemoryStore::default())).expect("state manager"));
        let relationer = UnitRelationer::new(rel.relation_unit(), state_mgr.clone());
        (rel, state_mgr, relationer)
    }

    fn db() -> Endpoint {
        endpoint("wordpress", "db", Role::Requirer, Scope::Global)
    }

    fn snapshot(members: &[(&str, i64)]) -> RelationSnapshot {
        RelationSnapshot {
            life: Life::Alive,
            members: members
                .iter()
                .map(|(u, v)| (UnitName::from(*u), *v))
                .collect(),
            ..Default::default()
        }
    }

    async fn run(relationer: &UnitRelationer, remote: &RelationSnapshot) -> Vec<String> {
        let mut fired = Vec::new();
        while let Some(info) = relationer.next_hook(remote).expect("next hook") {
            let name = relationer.prepare_hook(&info).expect("prepare");
            relationer.commit_hook(&info).await.expect("commit");
            fired.push(match &info.remote_unit {
                Some(unit) => format!("{name} {unit}"),
                None => name,
            });
            if info.kind == HookKind::RelationBroken {
                break;
            }
        }
        fired
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let (rel, state_mgr, relationer) = setup(db());
        relationer.join().await.expect("join");
        relationer.join().await.expect("join again");
        assert_eq!(state_mgr.known_ids(), vec![RelationId(1)]);
        assert_eq!(rel.enter_calls(), 2);
    }

    #[tokio::test]
    async fn dying_relationer_refuses_to_join() {
        let (_rel, _state_mgr, mut relationer) = setup(db());
        relationer.set_dying();
        let err = relationer.join().await.unwrap_err();
        assert!(matches!(err, TrackerError::DyingJoin(RelationId(1))), "got: {err}");
    }

    #[tokio::test]
    async fn full_lifecycle_hook_order() {
        let (_rel, state_mgr, mut relationer) = setup(db());
        relationer.join().await.expect("join");

        let fired = run(&relationer, &snapshot(&[("mysql/1", 1), ("mysql/0", 4)])).await;
        assert_eq!(
            fired,
            vec![
                "db-relation-created",
                "db-relation-joined mysql/0",
                "db-relation-changed mysql/0",
                "db-relation-joined mysql/1",
                "db-relation-changed mysql/1",
            ]
        );

        let fired = run(&relationer, &snapshot(&[("mysql/0", 5)])).await;
        assert_eq!(
            fired,
            vec!["db-relation-departed mysql/1", "db-relation-changed mysql/0"]
        );

        relationer.set_dying();
        let fired = run(&relationer, &snapshot(&[("mysql/0", 5)])).await;
        assert_eq!(
            fired,
            vec!["db-relation-departed mysql/0", "db-relation-broken"]
        );
        assert!(!state_mgr.relation_found(RelationId(1)));
    }

    #[tokio::test]
    async fn application_settings_change_fires_changed() {
        let (_rel, _state_mgr, relationer) = setup(db());
        relationer.join().await.expect("join");
        let mut remote = snapshot(&[]);
        remote.application_members.insert("mysql".into(), 3);
        let fired = run(&relationer, &remote).await;
        assert_eq!(fired, vec!["db-relation-created", "db-relation-changed"]);
    }

    #[tokio::test]
    async fn stale_changed_is_rejected_as_no_op() {
        let (_rel, _state_mgr, relationer) = setup(db());
        relationer.join().await.expect("join");
        run(&relationer, &snapshot(&[("mysql/0", 2)])).await;

        let stale = HookInfo::relation(HookKind::RelationChanged, RelationId(1))
            .with_remote_unit("mysql/0", 2);
        match relationer.prepare_hook(&stale).unwrap_err() {
            TrackerError::State(err) => assert!(err.is_no_op(), "got: {err}"),
            other => panic!("expected state error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn die_tolerates_missing_scope() {
        let (rel, state_mgr, relationer) = setup(db());
        relationer.join().await.expect("join");
        rel.fail_leave_scope(ApiError::NotFound("relation 1".into()));
        relationer.die().await.expect("die");
        assert!(!state_mgr.relation_found(RelationId(1)));
    }

    #[tokio::test]
    async fn die_keeps_state_when_leaving_scope_fails() {
        let (rel, state_mgr, relationer) = setup(db());
        relationer.join().await.expect("join");
        rel.fail_leave_scope(ApiError::Other("connection reset".into()));
        let err = relationer.die().await.unwrap_err();
        assert!(matches!(err, TrackerError::LeaveScope { .. }), "got: {err}");
        assert!(state_mgr.relation_found(RelationId(1)));
    }

    #[tokio::test]
    async fn implicit_relation_runs_no_hooks() {
        let ep = endpoint("wordpress", "juju-info", Role::Provider, Scope::Global);
        let (_rel, _state_mgr, relationer) = setup(Endpoint {
            interface: "juju-info".into(),
            ..ep
        });
        relationer.join().await.expect("join");
        assert!(relationer.is_implicit());
        assert_eq!(relationer.next_hook(&snapshot(&[("mysql/0", 1)])).unwrap(), None);
        let created = HookInfo::relation(HookKind::RelationCreated, RelationId(1));
        assert!(matches!(
            relationer.prepare_hook(&created),
            Err(TrackerError::ImplicitRelation(_))
        ));
    }

    #[tokio::test]
    async fn context_info_lists_members() {
        let (_rel, _state_mgr, relationer) = setup(db());
        relationer.join().await.expect("join");
        run(&relationer, &snapshot(&[("mysql/1", 1), ("mysql/0", 1)])).await;
        let info = relationer.context_info();
        assert_eq!(info.remote_application, "mysql");
        assert_eq!(info.endpoint.name, "db");
        assert_eq!(
            info.member_names,
            vec![UnitName::from("mysql/0"), UnitName::from("mysql/1")]
        );
    }

    #[tokio::test]
    async fn context_info_without_state_reports_no_members() {
        let (_rel, state_mgr, relationer) = setup(db());
        relationer.join().await.expect("join");
        state_mgr.remove_relation(RelationId(1)).expect("purge");

        let info = relationer.context_info();
        assert_eq!(info.relation_id, RelationId(1));
        assert!(info.member_names.is_empty());
    }
}
