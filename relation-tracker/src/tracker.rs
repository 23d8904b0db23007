//! Relation state tracker.
//!
//! Reconciles the relations the local unit is tracking against each remote
//! snapshot: joins new relations, marks dying ones, and destroys an orphaned
//! subordinate. It also answers the per-relation queries the hook scheduler
//! needs and routes hook prepare/commit to the owning relationer.
//!
//! All mutation happens through `&mut self`; the owning control loop
//! serialises calls.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use relation_core::{
    CharmMeta, CharmReader, HookError, HookInfo, HookKind, Life, RelationId, RelationSnapshot,
    RelationStatusValue, RemoteSnapshot, Role, Scope, UnitName,
};
use relation_state::{RelationState, StateManager};

use crate::api::{LeadershipContext, NotifyWatcher, Relation, StateTrackerState, Unit};
use crate::error::TrackerError;
use crate::relationer::{NewRelationerFn, RelationInfo, Relationer};

/// Collaborators for a [`RelationStateTracker`].
pub struct TrackerConfig {
    pub state: Arc<dyn StateTrackerState>,
    pub unit: Arc<dyn Unit>,
    pub leadership: Arc<dyn LeadershipContext>,
    pub charm: Arc<dyn CharmReader>,
    pub abort: CancellationToken,
    pub state_manager: Arc<StateManager>,
    pub new_relationer: NewRelationerFn,
}

pub struct RelationStateTracker {
    state: Arc<dyn StateTrackerState>,
    unit: Arc<dyn Unit>,
    leadership: Arc<dyn LeadershipContext>,
    charm: Arc<dyn CharmReader>,
    abort: CancellationToken,
    state_manager: Arc<StateManager>,
    new_relationer: NewRelationerFn,
    /// Set when the local unit is a subordinate; resolved once at startup.
    principal: Option<UnitName>,

    relationers: BTreeMap<RelationId, Box<dyn Relationer>>,
    remote_app: BTreeMap<RelationId, String>,
    created: BTreeSet<RelationId>,
    peer: BTreeSet<RelationId>,
}

impl RelationStateTracker {
    /// Build a tracker and reconcile persisted state with the controller's
    /// startup relation listing.
    pub async fn new(cfg: TrackerConfig) -> Result<Self, TrackerError> {
        let principal = cfg.unit.principal_name().await?;
        let mut tracker = Self {
            state: cfg.state,
            unit: cfg.unit,
            leadership: cfg.leadership,
            charm: cfg.charm,
            abort: cfg.abort,
            state_manager: cfg.state_manager,
            new_relationer: cfg.new_relationer,
            principal,
            relationers: BTreeMap::new(),
            remote_app: BTreeMap::new(),
            created: BTreeSet::new(),
            peer: BTreeSet::new(),
        };
        tracker.load_initial_state().await?;
        Ok(tracker)
    }

    async fn load_initial_state(&mut self) -> Result<(), TrackerError> {
        let statuses = self.unit.relations_status().await?;

        let mut in_scope: BTreeMap<RelationId, Arc<dyn Relation>> = BTreeMap::new();
        let mut suspended = BTreeSet::new();
        for status in statuses {
            if !status.in_scope {
                continue;
            }
            let rel = match self.state.relation(&status.key).await {
                Ok(rel) => rel,
                Err(err) if err.is_not_found_or_unauthorized() => {
                    tracing::warn!(relation = %status.key, error = %err, "relation not visible, skipping");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let id = rel.id();
            if status.suspended {
                suspended.insert(id);
            }
            // In scope means relation-created already ran.
            self.created.insert(id);
            in_scope.insert(id, rel);
        }

        for id in self.state_manager.known_ids() {
            if let Some(rel) = in_scope.get(&id) {
                self.join_relation(rel.clone()).await?;
            } else if !suspended.contains(&id) {
                tracing::info!(relation = %id, "purging state of departed relation");
                self.state_manager.remove_relation(id)?;
            }
        }

        for (id, rel) in in_scope {
            if self.relationers.contains_key(&id) {
                continue;
            }
            self.join_relation(rel).await?;
        }

        let created: Vec<RelationId> = self.created.iter().copied().collect();
        for id in created {
            self.persist_created(id)?;
        }
        Ok(())
    }

    /// Record relation-created as already run so the relationer never
    /// schedules it for a relation the unit was in scope of at startup.
    fn persist_created(&self, id: RelationId) -> Result<(), TrackerError> {
        let mut st = self.state_manager.relation(id)?;
        if !st.created {
            st.created = true;
            self.state_manager.set_relation(&st)?;
        }
        Ok(())
    }

    /// Enter scope for `rel`, waiting on unit changes while the controller
    /// says scope entry is not possible yet.
    async fn join_relation(&mut self, rel: Arc<dyn Relation>) -> Result<(), TrackerError> {
        let key = rel.key();
        tracing::info!(relation = %key, "joining relation");

        let relation_unit = rel.unit(&self.unit.name()).await?;
        let relationer = (self.new_relationer)(relation_unit.clone(), self.state_manager.clone());

        let mut watcher = self.unit.watch().await?;
        let result = self
            .wait_for_scope(rel.as_ref(), relationer.as_ref(), watcher.as_mut())
            .await;
        if let Err(err) = watcher.stop() {
            tracing::error!(relation = %key, error = %err, "stopping unit watcher failed");
        }
        result?;

        let id = rel.id();
        self.remote_app.insert(id, rel.other_application());
        if relation_unit.endpoint().role == Role::Peer {
            self.peer.insert(id);
        }
        self.relationers.insert(id, relationer);
        tracing::info!(relation = %key, "joined relation");
        Ok(())
    }

    async fn wait_for_scope(
        &self,
        rel: &dyn Relation,
        relationer: &dyn Relationer,
        watcher: &mut dyn NotifyWatcher,
    ) -> Result<(), TrackerError> {
        loop {
            tokio::select! {
                biased;
                _ = self.abort.cancelled() => return Err(TrackerError::LoopAborted),
                changed = watcher.changed() => {
                    if !changed {
                        return Err(TrackerError::WatcherClosed);
                    }
                    match relationer.join().await {
                        Ok(()) => {}
                        Err(err) if err.is_cannot_enter_scope_yet() => {
                            tracing::info!(
                                relation = %rel.key(),
                                "cannot enter scope yet, waiting for subordinate to be removed",
                            );
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                    // Only the leader writes the shared relation status.
                    if self.leadership.is_leader().await? {
                        rel.set_status(RelationStatusValue::Joined).await?;
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Reconcile tracked relations with `remote`.
    pub async fn synchronize_scopes(&mut self, remote: &RemoteSnapshot) -> Result<(), TrackerError> {
        let mut charm: Option<CharmMeta> = None;

        for (&id, snapshot) in &remote.relations {
            if let Some(relationer) = self.relationers.get(&id) {
                relationer
                    .relation_unit()
                    .relation()
                    .update_suspended(snapshot.suspended);
                if snapshot.life != Life::Alive || snapshot.suspended {
                    self.set_dying(id).await?;
                }
                continue;
            }

            // Never seen, so nothing to wind down.
            if snapshot.life != Life::Alive || snapshot.suspended {
                continue;
            }

            let rel = match self.state.relation_by_id(id).await {
                Ok(rel) => rel,
                Err(err) if err.is_not_found_or_unauthorized() => {
                    tracing::debug!(relation = %id, error = %err, "relation not visible, skipping");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let ep = rel.endpoint().await?;

            if charm.is_none() {
                charm = Some(self.charm.read()?);
            }
            let implemented = charm.as_ref().is_some_and(|meta| ep.implemented_by(meta));
            if !implemented {
                tracing::warn!(relation = %id, endpoint = %ep.name, "skipping relation with unknown endpoint");
                continue;
            }

            if let Err(err) = self.join_relation(rel).await {
                if !err.is_cannot_enter_scope() {
                    return Err(err);
                }
                tracing::warn!(relation = %id, error = %err, "abandoning relation");
                self.state_manager.remove_relation(id)?;
            }
        }

        self.destroy_if_orphaned().await
    }

    /// A subordinate with no live container-scoped relation to its principal
    /// has nothing left to attach to.
    async fn destroy_if_orphaned(&self) -> Result<(), TrackerError> {
        let Some(principal) = &self.principal else {
            return Ok(());
        };
        let principal_app = principal.application()?;

        let attached = self.relationers.values().any(|relationer| {
            if relationer.is_dying() {
                return false;
            }
            let relation_unit = relationer.relation_unit();
            let rel = relation_unit.relation();
            rel.life() == Life::Alive
                && rel.other_application() == principal_app
                && relation_unit.endpoint().scope == Scope::Container
        });
        if attached {
            return Ok(());
        }

        tracing::info!(
            unit = %self.unit.name(),
            principal = %principal,
            "no container relation to principal remains, destroying unit",
        );
        self.unit.destroy().await?;
        Ok(())
    }

    async fn set_dying(&mut self, id: RelationId) -> Result<(), TrackerError> {
        let Some(relationer) = self.relationers.get_mut(&id) else {
            return Ok(());
        };
        relationer.set_dying();
        if relationer.is_implicit() {
            // Implicit relations never see relation-broken.
            relationer.die().await?;
            self.forget(id);
        }
        Ok(())
    }

    fn forget(&mut self, id: RelationId) {
        self.relationers.remove(&id);
        self.created.remove(&id);
        self.remote_app.remove(&id);
        self.peer.remove(&id);
    }

    fn relationer(&self, info: &HookInfo) -> Result<(RelationId, &dyn Relationer), TrackerError> {
        if !info.kind.is_relation() {
            return Err(TrackerError::NotRelationHook(info.kind));
        }
        info.validate()?;
        let id = info
            .relation_id
            .ok_or(HookError::MissingRelationId { kind: info.kind })?;
        Ok((id, self.known(id)?))
    }

    /// Validate a relation hook and return the name it runs under.
    pub fn prepare_hook(&self, info: &HookInfo) -> Result<String, TrackerError> {
        let (_, relationer) = self.relationer(info)?;
        relationer.prepare_hook(info)
    }

    /// Record a successfully executed relation hook. Tracking maps change
    /// only once the relationer's commit has succeeded.
    pub async fn commit_hook(&mut self, info: &HookInfo) -> Result<(), TrackerError> {
        let (id, relationer) = self.relationer(info)?;
        relationer.commit_hook(info).await?;
        match info.kind {
            HookKind::RelationCreated => {
                self.created.insert(id);
            }
            HookKind::RelationBroken => self.forget(id),
            _ => {}
        }
        Ok(())
    }

    /// The hook due next for relation `id`, if any.
    pub fn next_hook(
        &self,
        id: RelationId,
        remote: &RelationSnapshot,
    ) -> Result<Option<HookInfo>, TrackerError> {
        self.known(id)?.next_hook(remote)
    }

    fn known(&self, id: RelationId) -> Result<&dyn Relationer, TrackerError> {
        self.relationers
            .get(&id)
            .map(|r| &**r)
            .ok_or(TrackerError::UnknownRelation(id))
    }

    pub fn is_known(&self, id: RelationId) -> bool {
        self.relationers.contains_key(&id)
    }

    pub fn is_implicit(&self, id: RelationId) -> Result<bool, TrackerError> {
        Ok(self.known(id)?.is_implicit())
    }

    pub fn is_peer_relation(&self, id: RelationId) -> Result<bool, TrackerError> {
        self.known(id)?;
        Ok(self.peer.contains(&id))
    }

    pub fn has_container_scope(&self, id: RelationId) -> Result<bool, TrackerError> {
        Ok(self.known(id)?.relation_unit().endpoint().scope == Scope::Container)
    }

    pub fn relation_created(&self, id: RelationId) -> bool {
        self.created.contains(&id)
    }

    pub fn remote_application(&self, id: RelationId) -> Option<&str> {
        self.remote_app.get(&id).map(String::as_str)
    }

    pub fn state(&self, id: RelationId) -> Result<RelationState, TrackerError> {
        self.known(id)?;
        Ok(self.state_manager.relation(id)?)
    }

    pub fn state_found(&self, id: RelationId) -> bool {
        self.state_manager.relation_found(id)
    }

    pub fn get_info(&self) -> BTreeMap<RelationId, RelationInfo> {
        self.relationers
            .iter()
            .map(|(&id, relationer)| (id, relationer.context_info()))
            .collect()
    }

    /// Endpoint name of relation `id`.
    pub fn name(&self, id: RelationId) -> Result<String, TrackerError> {
        Ok(self.known(id)?.relation_unit().endpoint().name)
    }

    pub fn local_unit_name(&self) -> UnitName {
        self.unit.name()
    }

    pub async fn local_unit_and_application_life(&self) -> Result<(Life, Life), TrackerError> {
        let unit_life = self.unit.refresh_life().await?;
        let app_life = self.unit.application_life().await?;
        Ok((unit_life, app_life))
    }
}
