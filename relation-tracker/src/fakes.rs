//! Test doubles for the controller boundary.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use relation_core::{
    ApiError, CharmError, CharmMeta, CharmReader, Endpoint, Life, RelationId, RelationKey,
    RelationStatus, RelationStatusValue, Role, Scope, UnitName,
};

use crate::api::{
    LeadershipContext, NotifyWatcher, Relation, RelationUnit, StateTrackerState, Unit,
};
use crate::watcher::ChannelWatcher;

pub fn endpoint(app: &str, name: &str, role: Role, scope: Scope) -> Endpoint {
    Endpoint {
        application_name: app.to_string(),
        name: name.to_string(),
        interface: name.to_string(),
        role,
        scope,
    }
}

/// Controller calls in the order they happened, shared by every fake.
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
struct RelationData {
    id: RelationId,
    key: RelationKey,
    other_app: String,
    endpoint: Endpoint,
    life: Life,
    suspended: AtomicBool,
    enter_errors: Mutex<VecDeque<ApiError>>,
    enter_calls: AtomicUsize,
    leave_error: Mutex<Option<ApiError>>,
    statuses: Mutex<Vec<RelationStatusValue>>,
    log: CallLog,
}

/// Cheap handle; clones share state.
#[derive(Debug, Clone)]
pub struct FakeRelation(Arc<RelationData>);

impl FakeRelation {
    pub fn new(id: i64, other_app: &str, endpoint: Endpoint) -> Self {
        Self::with_log(id, other_app, endpoint, CallLog::default())
    }

    pub fn with_log(id: i64, other_app: &str, endpoint: Endpoint, log: CallLog) -> Self {
        let key = format!(
            "{}:{} {}:{} #{id}",
            endpoint.application_name, endpoint.name, other_app, endpoint.interface
        );
        Self(Arc::new(RelationData {
            id: RelationId(id),
            key: RelationKey(key),
            other_app: other_app.to_string(),
            endpoint,
            life: Life::Alive,
            suspended: AtomicBool::new(false),
            enter_errors: Mutex::new(VecDeque::new()),
            enter_calls: AtomicUsize::new(0),
            leave_error: Mutex::new(None),
            statuses: Mutex::new(Vec::new()),
            log,
        }))
    }

    pub fn relation_unit(&self) -> Arc<dyn RelationUnit> {
        Arc::new(FakeRelationUnit {
            relation: self.clone(),
        })
    }

    /// Queue errors returned by the next `enter_scope` calls.
    pub fn fail_enter_scope(&self, err: ApiError) {
        self.0.enter_errors.lock().unwrap().push_back(err);
    }

    pub fn fail_leave_scope(&self, err: ApiError) {
        *self.0.leave_error.lock().unwrap() = Some(err);
    }

    pub fn enter_calls(&self) -> usize {
        self.0.enter_calls.load(Ordering::SeqCst)
    }

    pub fn statuses(&self) -> Vec<RelationStatusValue> {
        self.0.statuses.lock().unwrap().clone()
    }

    pub fn status(&self, in_scope: bool, suspended: bool) -> RelationStatus {
        RelationStatus {
            key: self.0.key.clone(),
            in_scope,
            suspended,
        }
    }

    fn record(&self, call: &str) {
        self.0
            .log
            .lock()
            .unwrap()
            .push(format!("{call} {}", self.0.id));
    }
}

#[async_trait]
impl Relation for FakeRelation {
    fn id(&self) -> RelationId {
        self.0.id
    }

    fn key(&self) -> RelationKey {
        self.0.key.clone()
    }

    fn other_application(&self) -> String {
        self.0.other_app.clone()
    }

    fn life(&self) -> Life {
        self.0.life
    }

    fn suspended(&self) -> bool {
        self.0.suspended.load(Ordering::SeqCst)
    }

    fn update_suspended(&self, suspended: bool) {
        self.0.suspended.store(suspended, Ordering::SeqCst);
    }

    async fn endpoint(&self) -> Result<Endpoint, ApiError> {
        Ok(self.0.endpoint.clone())
    }

    async fn set_status(&self, status: RelationStatusValue) -> Result<(), ApiError> {
        self.0.statuses.lock().unwrap().push(status);
        Ok(())
    }

    async fn unit(&self, _unit: &UnitName) -> Result<Arc<dyn RelationUnit>, ApiError> {
        Ok(self.relation_unit())
    }
}

pub struct FakeRelationUnit {
    relation: FakeRelation,
}

#[async_trait]
impl RelationUnit for FakeRelationUnit {
    fn relation(&self) -> Arc<dyn Relation> {
        Arc::new(self.relation.clone())
    }

    fn endpoint(&self) -> Endpoint {
        self.relation.0.endpoint.clone()
    }

    async fn enter_scope(&self) -> Result<(), ApiError> {
        self.relation.0.enter_calls.fetch_add(1, Ordering::SeqCst);
        self.relation.record("enter");
        match self.relation.0.enter_errors.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn leave_scope(&self) -> Result<(), ApiError> {
        self.relation.record("leave");
        match self.relation.0.leave_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Relations known to the controller.
#[derive(Debug, Default)]
pub struct FakeState {
    relations: Mutex<BTreeMap<RelationId, FakeRelation>>,
}

impl FakeState {
    pub fn add(&self, rel: &FakeRelation) {
        self.relations.lock().unwrap().insert(rel.id(), rel.clone());
    }
}

#[async_trait]
impl StateTrackerState for FakeState {
    async fn relation(&self, key: &RelationKey) -> Result<Arc<dyn Relation>, ApiError> {
        self.relations
            .lock()
            .unwrap()
            .values()
            .find(|rel| &rel.key() == key)
            .map(|rel| Arc::new(rel.clone()) as Arc<dyn Relation>)
            .ok_or_else(|| ApiError::NotFound(format!("relation {key:?}")))
    }

    async fn relation_by_id(&self, id: RelationId) -> Result<Arc<dyn Relation>, ApiError> {
        self.relations
            .lock()
            .unwrap()
            .get(&id)
            .map(|rel| Arc::new(rel.clone()) as Arc<dyn Relation>)
            .ok_or_else(|| ApiError::NotFound(format!("relation {id}")))
    }
}

/// The local unit. Every watcher it hands out starts with
/// `initial_events` pending changes.
#[derive(Debug)]
pub struct FakeUnit {
    pub name: UnitName,
    pub statuses: Mutex<Vec<RelationStatus>>,
    pub principal: Option<UnitName>,
    pub initial_events: usize,
    pub life: Life,
    pub application_life: Life,
    /// Watchers report a failure when stopped.
    pub failing_stop: bool,
    destroy_calls: AtomicUsize,
    principal_calls: AtomicUsize,
    watchers: Mutex<Vec<mpsc::Sender<()>>>,
}

impl FakeUnit {
    pub fn new(name: &str) -> Self {
        Self {
            name: UnitName::from(name),
            statuses: Mutex::new(Vec::new()),
            principal: None,
            initial_events: 1,
            life: Life::Alive,
            application_life: Life::Alive,
            failing_stop: false,
            destroy_calls: AtomicUsize::new(0),
            principal_calls: AtomicUsize::new(0),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn subordinate_of(mut self, principal: &str) -> Self {
        self.principal = Some(UnitName::from(principal));
        self
    }

    pub fn with_initial_events(mut self, n: usize) -> Self {
        self.initial_events = n;
        self
    }

    pub fn with_failing_watcher_stop(mut self) -> Self {
        self.failing_stop = true;
        self
    }

    pub fn principal_calls(&self) -> usize {
        self.principal_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn watchers_started(&self) -> usize {
        self.watchers.lock().unwrap().len()
    }

    /// Every watcher handed out has been stopped.
    pub fn watchers_stopped(&self) -> bool {
        self.watchers.lock().unwrap().iter().all(|tx| tx.is_closed())
    }
}

#[async_trait]
impl Unit for FakeUnit {
    fn name(&self) -> UnitName {
        self.name.clone()
    }

    async fn relations_status(&self) -> Result<Vec<RelationStatus>, ApiError> {
        Ok(self.statuses.lock().unwrap().clone())
    }

    async fn watch(&self) -> Result<Box<dyn NotifyWatcher>, ApiError> {
        let (tx, watcher) = ChannelWatcher::channel(self.initial_events.max(1));
        for _ in 0..self.initial_events {
            let _ = tx.try_send(());
        }
        self.watchers.lock().unwrap().push(tx);
        if self.failing_stop {
            return Ok(Box::new(FailingStopWatcher(watcher)));
        }
        Ok(Box::new(watcher))
    }

    async fn principal_name(&self) -> Result<Option<UnitName>, ApiError> {
        self.principal_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.principal.clone())
    }

    async fn destroy(&self) -> Result<(), ApiError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh_life(&self) -> Result<Life, ApiError> {
        Ok(self.life)
    }

    async fn application_life(&self) -> Result<Life, ApiError> {
        Ok(self.application_life)
    }
}

/// Closes like a [`ChannelWatcher`] but reports the stop as failed.
struct FailingStopWatcher(ChannelWatcher);

#[async_trait]
impl NotifyWatcher for FailingStopWatcher {
    async fn changed(&mut self) -> bool {
        self.0.changed().await
    }

    fn stop(&mut self) -> Result<(), ApiError> {
        self.0.stop()?;
        Err(ApiError::WatcherStopped("connection lost".to_string()))
    }
}

#[derive(Debug, Default)]
pub struct FakeLeadership {
    pub leader: AtomicBool,
}

impl FakeLeadership {
    pub fn leader() -> Self {
        Self {
            leader: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl LeadershipContext for FakeLeadership {
    async fn is_leader(&self) -> Result<bool, ApiError> {
        Ok(self.leader.load(Ordering::SeqCst))
    }
}

/// Serves a fixed charm and counts reads.
#[derive(Debug, Default)]
pub struct FakeCharm {
    meta: CharmMeta,
    reads: AtomicUsize,
}

impl FakeCharm {
    pub fn from_yaml(yaml: &str) -> Self {
        let meta = CharmMeta::parse(yaml, std::path::Path::new("metadata.yaml"))
            .expect("valid test metadata");
        Self {
            meta,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl CharmReader for FakeCharm {
    fn read(&self) -> Result<CharmMeta, CharmError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.meta.clone())
    }
}
