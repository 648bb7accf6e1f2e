//! Dataset RBAC Shared Types
//!
//! Data model shared by the decision engine and its store adapters.
//!
//! - **Actions**: the fixed action catalog and its registry
//! - **Models**: roles, users, groups, datasets and their containers
//! - **Associations**: typed join rows between the models
//! - **Permissions**: per-action role requirements for a dataset

pub mod action;
pub mod association;
pub mod models;
pub mod permission;

pub use action::{Action, ActionRegistry, CompositionModel};
pub use association::Association;
pub use models::*;
pub use permission::{PermissionMap, PermissionRecord};
