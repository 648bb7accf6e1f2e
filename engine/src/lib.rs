//! Dataset RBAC Engine
//!
//! Decides which users may perform which actions on datasets, derives
//! permissions for datasets produced from others, and maintains the role,
//! group and default-permission associations those decisions rest on.
//!
//! Persistence is delegated to a [`PermissionStore`] adapter.

pub mod agent;
pub mod associations;
pub mod config;
pub mod dataset;
pub mod decision;
pub mod defaults;
pub mod derivation;
pub mod engine;
pub mod error;
pub mod folders;
pub mod store;

pub use agent::RbacAgent;
pub use associations::{AssociationRequest, ComponentSet};
pub use config::EngineConfig;
pub use decision::decide;
pub use derivation::combine_permissions;
pub use engine::RbacEngine;
pub use error::{RbacError, RbacResult, StoreError, StoreResult};
pub use store::{CachedStore, MemoryStore, PermissionStore, Snapshot, StoreOp};

pub use rbac_types as types;
pub use rbac_types::{
    Action, ActionRegistry, AsDataset, Association, CompositionModel, Dataset, FolderEntry,
    History, PermissionMap, PermissionRecord, Role, RoleType, User,
};
