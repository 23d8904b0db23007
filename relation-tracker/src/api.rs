//! Capability traits at the controller boundary.
//!
//! Each trait covers one thing the tracker needs from the outside world.
//! Live adapters wrap the controller client; tests use the doubles in
//! `fakes`.

use std::sync::Arc;

use async_trait::async_trait;

use relation_core::{
    ApiError, Endpoint, Life, RelationId, RelationKey, RelationStatus, RelationStatusValue,
    UnitName,
};

/// The local unit.
#[async_trait]
pub trait Unit: Send + Sync {
    fn name(&self) -> UnitName;

    /// Startup listing of every relation the unit participates in.
    async fn relations_status(&self) -> Result<Vec<RelationStatus>, ApiError>;

    /// A watcher that fires whenever the unit document changes.
    async fn watch(&self) -> Result<Box<dyn NotifyWatcher>, ApiError>;

    /// Name of the principal unit; `None` when this unit is not a subordinate.
    async fn principal_name(&self) -> Result<Option<UnitName>, ApiError>;

    /// Ask the controller to destroy this unit.
    async fn destroy(&self) -> Result<(), ApiError>;

    /// Current life of the unit, refreshed from the controller.
    async fn refresh_life(&self) -> Result<Life, ApiError>;

    /// Current life of the unit's application, refreshed from the controller.
    async fn application_life(&self) -> Result<Life, ApiError>;
}

#[async_trait]
pub trait Relation: Send + Sync {
    fn id(&self) -> RelationId;
    fn key(&self) -> RelationKey;
    fn other_application(&self) -> String;
    fn life(&self) -> Life;
    fn suspended(&self) -> bool;

    /// Record the suspended flag seen in the latest snapshot.
    fn update_suspended(&self, suspended: bool);

    /// The local unit's endpoint of this relation.
    async fn endpoint(&self) -> Result<Endpoint, ApiError>;

    async fn set_status(&self, status: RelationStatusValue) -> Result<(), ApiError>;

    /// The local unit's membership handle for this relation.
    async fn unit(&self, unit: &UnitName) -> Result<Arc<dyn RelationUnit>, ApiError>;
}

/// One unit's membership of one relation.
#[async_trait]
pub trait RelationUnit: Send + Sync {
    fn relation(&self) -> Arc<dyn Relation>;
    fn endpoint(&self) -> Endpoint;
    async fn enter_scope(&self) -> Result<(), ApiError>;
    async fn leave_scope(&self) -> Result<(), ApiError>;
}

/// Controller lookups used by the tracker.
#[async_trait]
pub trait StateTrackerState: Send + Sync {
    async fn relation(&self, key: &RelationKey) -> Result<Arc<dyn Relation>, ApiError>;
    async fn relation_by_id(&self, id: RelationId) -> Result<Arc<dyn Relation>, ApiError>;
}

#[async_trait]
pub trait LeadershipContext: Send + Sync {
    async fn is_leader(&self) -> Result<bool, ApiError>;
}

/// Change notifications with no payload.
#[async_trait]
pub trait NotifyWatcher: Send {
    /// Wait for the next change. Returns `false` once the watcher is closed.
    async fn changed(&mut self) -> bool;

    fn stop(&mut self) -> Result<(), ApiError>;
}
