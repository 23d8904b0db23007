//! Relation core library: domain types, hook descriptors, charm metadata,
//! agent settings, errors.
//!
//! - [`types`]: newtypes, enums and remote snapshots
//! - [`hook`]: [`HookKind`] and [`HookInfo`]
//! - [`charm`]: charm metadata and [`CharmReader`]
//! - [`settings`] / [`paths`]: agent configuration and file layout
//! - [`error`]: error enums for every concern above

pub mod charm;
pub mod error;
pub mod hook;
pub mod paths;
pub mod settings;
pub mod types;

pub use charm::{CharmDirReader, CharmMeta, CharmReader, CharmRelation};
pub use error::{ApiError, CharmError, HookError, NameError, SettingsError};
pub use hook::{HookInfo, HookKind};
pub use settings::AgentSettings;
pub use types::{
    Endpoint, Life, RelationId, RelationKey, RelationSnapshot, RelationStatus,
    RelationStatusValue, RemoteSnapshot, Role, Scope, UnitName,
};
