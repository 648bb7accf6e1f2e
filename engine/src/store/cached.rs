//! Per-Dataset Permission Record Cache
//!
//! Caches each dataset's full permission-record list using `DashMap` for
//! lock-free concurrent access. `is_allowed` is the hot path and reads the
//! same dataset repeatedly; records are loaded once and invalidated by any
//! write that touches the dataset.
//!
//! Every slot carries the generation it was reserved at, drawn from one
//! cache-wide counter. A load only stores its result if its slot is still
//! present with the same generation, and that check runs under the shard
//! lock that invalidation also takes. A load that raced a write is
//! therefore discarded rather than cached.
//!
//! The number of slots is bounded by `capacity`; reserving a new slot at
//! capacity evicts another one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rbac_types::{
    Action, Association, FolderContents, History, HistoryDatasetAssociation, NewRole,
    PermissionRecord, Role, RoleMembers, RoleType,
};
use uuid::Uuid;

use super::{PermissionStore, StoreOp};
use crate::error::StoreResult;

/// Default maximum number of cached datasets.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Cached records paired with the generation their slot was reserved at.
#[derive(Debug)]
struct Slot {
    generation: u64,
    /// `None` while the first load is in flight.
    records: Option<Arc<Vec<PermissionRecord>>>,
}

/// Store decorator caching permission records per dataset.
#[derive(Debug)]
pub struct CachedStore<S> {
    inner: S,
    enabled: bool,
    capacity: usize,
    slots: DashMap<Uuid, Slot>,
    /// Source of slot generations. Never reused, so a slot evicted and
    /// reserved again cannot be mistaken for the original.
    next_generation: AtomicU64,
}

impl<S: PermissionStore> CachedStore<S> {
    /// Wrap a store with the default capacity. With `enabled == false`
    /// every call passes straight through.
    pub fn new(inner: S, enabled: bool) -> Self {
        Self::with_capacity(inner, enabled, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap a store caching at most `capacity` datasets. A capacity of zero
    /// disables caching.
    pub fn with_capacity(inner: S, enabled: bool, capacity: usize) -> Self {
        Self {
            inner,
            enabled: enabled && capacity > 0,
            capacity,
            slots: DashMap::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of datasets whose records are currently cached.
    pub fn cached_datasets(&self) -> usize {
        self.slots.iter().filter(|s| s.records.is_some()).count()
    }

    /// Drop the cached records of a dataset and abandon in-flight loads of it.
    pub fn invalidate(&self, dataset_id: Uuid) {
        self.slots.remove(&dataset_id);
    }

    /// Get or reserve the slot of a dataset, returning its generation.
    fn reserve(&self, dataset_id: Uuid) -> u64 {
        if let Some(slot) = self.slots.get(&dataset_id) {
            return slot.generation;
        }

        if self.slots.len() >= self.capacity {
            self.evict_one(dataset_id);
        }

        self.slots
            .entry(dataset_id)
            .or_insert_with(|| Slot {
                generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                records: None,
            })
            .generation
    }

    /// Remove one slot other than `keep`. An evicted in-flight load is discarded.
    fn evict_one(&self, keep: Uuid) {
        let victim = self
            .slots
            .iter()
            .map(|entry| *entry.key())
            .find(|id| *id != keep);
        if let Some(victim) = victim {
            tracing::trace!(%victim, "Evicting cached permission records");
            self.slots.remove(&victim);
        }
    }

    async fn load_records(&self, dataset_id: Uuid) -> StoreResult<Arc<Vec<PermissionRecord>>> {
        // Fast path: records already cached
        let cached = self
            .slots
            .get(&dataset_id)
            .and_then(|slot| slot.records.clone());
        if let Some(records) = cached {
            return Ok(records);
        }

        let generation = self.reserve(dataset_id);
        let records = Arc::new(self.inner.fetch_permission_records(dataset_id, None).await?);

        // Compare and store under the shard lock `invalidate` also takes.
        match self.slots.get_mut(&dataset_id) {
            Some(mut slot) if slot.generation == generation => {
                slot.records = Some(Arc::clone(&records));
            }
            _ => tracing::trace!(%dataset_id, "Discarding stale permission records"),
        }

        Ok(records)
    }
}

impl<S: PermissionStore> PermissionStore for CachedStore<S> {
    async fn fetch_permission_records(
        &self,
        dataset_id: Uuid,
        action: Option<Action>,
    ) -> StoreResult<Vec<PermissionRecord>> {
        if !self.enabled {
            return self.inner.fetch_permission_records(dataset_id, action).await;
        }

        let records = self.load_records(dataset_id).await?;
        Ok(records
            .iter()
            .filter(|r| action.map_or(true, |a| r.action == a))
            .copied()
            .collect())
    }

    async fn fetch_role_membership(&self, user_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        self.inner.fetch_role_membership(user_id).await
    }

    async fn fetch_user_roles(&self, user_id: Uuid) -> StoreResult<Vec<Role>> {
        self.inner.fetch_user_roles(user_id).await
    }

    async fn fetch_role_members(&self, role_id: Uuid) -> StoreResult<RoleMembers> {
        self.inner.fetch_role_members(role_id).await
    }

    async fn create_role(&self, role: NewRole) -> StoreResult<Role> {
        self.inner.create_role(role).await
    }

    async fn delete_role(&self, role_id: Uuid) -> StoreResult<bool> {
        let result = self.inner.delete_role(role_id).await;
        // Dataset records naming the role are unknown here.
        self.slots.clear();
        result
    }

    async fn find_role_by_name_and_type(
        &self,
        name: &str,
        role_type: RoleType,
    ) -> StoreResult<Option<Role>> {
        self.inner.find_role_by_name_and_type(name, role_type).await
    }

    async fn create_association(&self, association: Association) -> StoreResult<Association> {
        let result = self.inner.create_association(association).await;
        if let Some(dataset_id) = association.dataset_id() {
            self.invalidate(dataset_id);
        }
        result
    }

    async fn delete_association(&self, association: &Association) -> StoreResult<bool> {
        let result = self.inner.delete_association(association).await;
        if let Some(dataset_id) = association.dataset_id() {
            self.invalidate(dataset_id);
        }
        result
    }

    async fn association_exists(&self, association: &Association) -> StoreResult<bool> {
        self.inner.association_exists(association).await
    }

    async fn apply_batch(&self, ops: Vec<StoreOp>) -> StoreResult<()> {
        let touched: HashSet<Uuid> = ops.iter().filter_map(StoreOp::dataset_id).collect();
        let result = self.inner.apply_batch(ops).await;
        // Invalidate even on failure: the inner store may not be transactional.
        for dataset_id in touched {
            self.invalidate(dataset_id);
        }
        result
    }

    async fn fetch_user_default_permissions(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<(Action, Uuid)>> {
        self.inner.fetch_user_default_permissions(user_id).await
    }

    async fn fetch_history_default_permissions(
        &self,
        history_id: Uuid,
    ) -> StoreResult<Vec<(Action, Uuid)>> {
        self.inner.fetch_history_default_permissions(history_id).await
    }

    async fn list_active_histories_of(&self, user_id: Uuid) -> StoreResult<Vec<History>> {
        self.inner.list_active_histories_of(user_id).await
    }

    async fn list_datasets_of(
        &self,
        history_id: Uuid,
    ) -> StoreResult<Vec<HistoryDatasetAssociation>> {
        self.inner.list_datasets_of(history_id).await
    }

    async fn has_library_association(&self, dataset_id: Uuid) -> StoreResult<bool> {
        self.inner.has_library_association(dataset_id).await
    }

    async fn history_associations_of(&self, dataset_id: Uuid) -> StoreResult<Vec<History>> {
        self.inner.history_associations_of(dataset_id).await
    }

    async fn list_folder_contents(&self, folder_id: Uuid) -> StoreResult<FolderContents> {
        self.inner.list_folder_contents(folder_id).await
    }
}
