//! Permission store adapter.
//!
//! The engine never persists anything itself; every read and write goes
//! through [`PermissionStore`]. Two adapters ship with the crate:
//! - [`MemoryStore`]: in-process reference store with JSON snapshots
//! - [`CachedStore`]: read cache for per-dataset permission records

pub mod cached;
pub mod memory;

use std::collections::HashSet;

use rbac_types::{
    Action, Association, FolderContents, History, HistoryDatasetAssociation, NewRole,
    PermissionRecord, Role, RoleMembers, RoleType,
};
use uuid::Uuid;

use crate::error::StoreResult;

pub use cached::CachedStore;
pub use memory::{MemoryStore, Snapshot};

/// One step of an atomic batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Create a row; creating an existing row is a no-op.
    Create(Association),
    /// Delete a row; deleting a missing row is a no-op.
    Delete(Association),
    /// Delete every permission record of one action on a dataset.
    ClearDatasetAction { dataset_id: Uuid, action: Action },
    /// Delete a user's whole default-permission template.
    ClearUserDefaults { user_id: Uuid },
    /// Delete a history's whole default-permission template.
    ClearHistoryDefaults { history_id: Uuid },
    /// Delete every user and group membership of a role.
    ClearRoleMembers { role_id: Uuid },
}

impl StoreOp {
    /// Dataset whose permission records this step may change.
    #[must_use]
    pub const fn dataset_id(&self) -> Option<Uuid> {
        match self {
            Self::Create(assoc) | Self::Delete(assoc) => assoc.dataset_id(),
            Self::ClearDatasetAction { dataset_id, .. } => Some(*dataset_id),
            Self::ClearUserDefaults { .. }
            | Self::ClearHistoryDefaults { .. }
            | Self::ClearRoleMembers { .. } => None,
        }
    }
}

/// Persistence collaborator consumed by the engine.
///
/// Implementations must make single-row creates and deletes atomic, and
/// must apply [`apply_batch`](PermissionStore::apply_batch) as one unit so
/// delete-then-insert sequences never expose a state with the old rows
/// gone and the new ones missing. Ordering of concurrent writers to the
/// same dataset is the implementation's responsibility.
#[allow(async_fn_in_trait)]
pub trait PermissionStore {
    /// Permission records of a dataset, optionally narrowed to one action.
    async fn fetch_permission_records(
        &self,
        dataset_id: Uuid,
        action: Option<Action>,
    ) -> StoreResult<Vec<PermissionRecord>>;

    /// Role ids the user holds directly. Group roles are not included.
    async fn fetch_role_membership(&self, user_id: Uuid) -> StoreResult<HashSet<Uuid>>;

    /// Roles the user holds directly, in association order.
    async fn fetch_user_roles(&self, user_id: Uuid) -> StoreResult<Vec<Role>>;

    async fn fetch_role_members(&self, role_id: Uuid) -> StoreResult<RoleMembers>;

    async fn create_role(&self, role: NewRole) -> StoreResult<Role>;

    /// Delete a role along with every association naming it.
    /// Returns `true` if the role existed.
    async fn delete_role(&self, role_id: Uuid) -> StoreResult<bool>;

    async fn find_role_by_name_and_type(
        &self,
        name: &str,
        role_type: RoleType,
    ) -> StoreResult<Option<Role>>;

    async fn create_association(&self, association: Association) -> StoreResult<Association>;

    /// Returns `true` if a row was deleted.
    async fn delete_association(&self, association: &Association) -> StoreResult<bool>;

    async fn association_exists(&self, association: &Association) -> StoreResult<bool>;

    /// Apply every step or none of them.
    async fn apply_batch(&self, ops: Vec<StoreOp>) -> StoreResult<()>;

    async fn fetch_user_default_permissions(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<(Action, Uuid)>>;

    async fn fetch_history_default_permissions(
        &self,
        history_id: Uuid,
    ) -> StoreResult<Vec<(Action, Uuid)>>;

    /// Non-deleted histories owned by the user.
    async fn list_active_histories_of(&self, user_id: Uuid) -> StoreResult<Vec<History>>;

    async fn list_datasets_of(&self, history_id: Uuid)
        -> StoreResult<Vec<HistoryDatasetAssociation>>;

    async fn has_library_association(&self, dataset_id: Uuid) -> StoreResult<bool>;

    /// Every history holding the dataset, with its owner.
    async fn history_associations_of(&self, dataset_id: Uuid) -> StoreResult<Vec<History>>;

    /// Non-deleted sub-folders and datasets of a library folder.
    async fn list_folder_contents(&self, folder_id: Uuid) -> StoreResult<FolderContents>;
}
