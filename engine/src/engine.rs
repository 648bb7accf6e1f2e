//! The concrete RBAC engine.
//!
//! Behaviour is split across modules by concern, each adding an
//! `impl RbacEngine` block:
//! - `decision`: allow/deny checks
//! - `derivation`: permissions for datasets derived from ancestors
//! - `associations`: memberships, private and sharing roles
//! - `dataset`: reading and replacing a dataset's permission records
//! - `defaults`: user and history default-permission templates
//! - `folders`: library subtree visibility

use rbac_types::ActionRegistry;

use crate::config::EngineConfig;
use crate::store::{CachedStore, PermissionStore};

/// Role-based access control engine over a permission store.
#[derive(Debug)]
pub struct RbacEngine<S> {
    pub(crate) store: S,
    pub(crate) registry: ActionRegistry,
    pub(crate) config: EngineConfig,
}

impl<S: PermissionStore> RbacEngine<S> {
    /// Engine with the default configuration and the full action catalog.
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Engine whose action registry is narrowed by `config.action_filter`.
    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            registry: config.registry(),
            config,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<S: PermissionStore> RbacEngine<CachedStore<S>> {
    /// Engine with the permission-record cache switched by `config.permission_cache`
    /// and bounded by `config.permission_cache_capacity`.
    pub fn cached(store: S, config: EngineConfig) -> Self {
        let store = CachedStore::with_capacity(
            store,
            config.permission_cache,
            config.permission_cache_capacity,
        );
        Self::with_config(store, config)
    }
}
