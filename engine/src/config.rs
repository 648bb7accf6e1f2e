//! Engine Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use rbac_types::ActionRegistry;
use std::env;

use crate::store::cached::DEFAULT_CACHE_CAPACITY;

/// Default description prefix for private roles.
pub const DEFAULT_PRIVATE_ROLE_PREFIX: &str = "Private Role for ";

/// Default name prefix for sharing roles.
pub const DEFAULT_SHARING_ROLE_PREFIX: &str = "Sharing role for: ";

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Restrict the engine to actions whose key starts with this prefix
    pub action_filter: Option<String>,

    /// Cache per-dataset permission records in front of the store (default: false)
    pub permission_cache: bool,

    /// Maximum number of datasets held by the permission cache (default: 10000)
    pub permission_cache_capacity: usize,

    /// Description prefix for auto-created private roles
    pub private_role_prefix: String,

    /// Name prefix for auto-created sharing roles
    pub sharing_role_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_filter: None,
            permission_cache: false,
            permission_cache_capacity: DEFAULT_CACHE_CAPACITY,
            private_role_prefix: DEFAULT_PRIVATE_ROLE_PREFIX.into(),
            sharing_role_prefix: DEFAULT_SHARING_ROLE_PREFIX.into(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            action_filter: env::var("RBAC_ACTION_FILTER")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            permission_cache: match env::var("RBAC_PERMISSION_CACHE") {
                Ok(v) => v
                    .trim()
                    .parse()
                    .context("RBAC_PERMISSION_CACHE must be true or false")?,
                Err(_) => false,
            },
            permission_cache_capacity: match env::var("RBAC_PERMISSION_CACHE_CAPACITY") {
                Ok(v) => v
                    .trim()
                    .parse()
                    .context("RBAC_PERMISSION_CACHE_CAPACITY must be a number")?,
                Err(_) => DEFAULT_CACHE_CAPACITY,
            },
            private_role_prefix: env::var("RBAC_PRIVATE_ROLE_PREFIX")
                .unwrap_or_else(|_| DEFAULT_PRIVATE_ROLE_PREFIX.into()),
            sharing_role_prefix: env::var("RBAC_SHARING_ROLE_PREFIX")
                .unwrap_or_else(|_| DEFAULT_SHARING_ROLE_PREFIX.into()),
        })
    }

    /// Build the action registry this configuration selects.
    ///
    /// Returns an instance-local copy; the global registry is left untouched.
    #[must_use]
    pub fn registry(&self) -> ActionRegistry {
        match &self.action_filter {
            Some(prefix) => ActionRegistry::global().filter_by_prefix(prefix),
            None => ActionRegistry::global().clone(),
        }
    }

    /// Create a default configuration for testing.
    ///
    /// Enables the permission cache so tests exercise the cached read path.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            permission_cache: true,
            ..Self::default()
        }
    }
}
