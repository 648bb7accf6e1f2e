//! In-memory permission store.
//!
//! Reference implementation of [`PermissionStore`] used by the tests and by
//! embedders without a database. All state sits behind one `RwLock`, so
//! writers are serialized and batches are applied to a staged copy that is
//! swapped in only when every step succeeded.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use rbac_types::{
    Action, Association, FolderContents, Group, History, HistoryDatasetAssociation, Library,
    LibraryDatasetAssociation, LibraryFolder, NewRole, PermissionRecord, Role, RoleMembers,
    RoleType, User,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PermissionStore, StoreOp};
use crate::error::{StoreError, StoreResult};

/// Full store contents, serializable for fixtures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub roles: Vec<Role>,
    pub histories: Vec<History>,
    pub history_datasets: Vec<HistoryDatasetAssociation>,
    pub libraries: Vec<Library>,
    pub folders: Vec<LibraryFolder>,
    pub library_datasets: Vec<LibraryDatasetAssociation>,
    pub associations: Vec<Association>,
}

impl Snapshot {
    fn role(&self, role_id: Uuid) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == role_id)
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Snapshot>,
    /// When set, every operation fails with `StoreError::Unavailable`.
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Load a store from a JSON snapshot.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }

    pub async fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.state.read().await)
    }

    /// Simulate a backend outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    pub async fn add_user(&self, user: User) {
        self.state.write().await.users.push(user);
    }

    pub async fn add_group(&self, group: Group) {
        self.state.write().await.groups.push(group);
    }

    pub async fn add_history(&self, history: History) {
        self.state.write().await.histories.push(history);
    }

    pub async fn add_history_dataset(&self, hda: HistoryDatasetAssociation) {
        self.state.write().await.history_datasets.push(hda);
    }

    pub async fn add_library(&self, library: Library) {
        self.state.write().await.libraries.push(library);
    }

    pub async fn add_folder(&self, folder: LibraryFolder) {
        self.state.write().await.folders.push(folder);
    }

    pub async fn add_library_dataset(&self, lda: LibraryDatasetAssociation) {
        self.state.write().await.library_datasets.push(lda);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject rows that reference a role the store does not know.
fn validate(roles: &[Role], association: &Association) -> StoreResult<()> {
    if let Some(role_id) = association.role_id() {
        if !roles.iter().any(|r| r.id == role_id) {
            return Err(StoreError::MissingEntity(format!("role {role_id}")));
        }
    }
    Ok(())
}

/// Apply one batch step to a staged association list.
fn apply_op(roles: &[Role], staged: &mut Vec<Association>, op: StoreOp) -> StoreResult<()> {
    match op {
        StoreOp::Create(assoc) => {
            validate(roles, &assoc)?;
            if !staged.contains(&assoc) {
                staged.push(assoc);
            }
        }
        StoreOp::Delete(assoc) => staged.retain(|a| *a != assoc),
        StoreOp::ClearDatasetAction { dataset_id, action } => staged.retain(|a| {
            !matches!(a, Association::ActionDatasetRole { action: act, dataset_id: ds, .. }
                if *act == action && *ds == dataset_id)
        }),
        StoreOp::ClearUserDefaults { user_id } => staged.retain(|a| {
            !matches!(a, Association::DefaultUserPermission { user_id: u, .. } if *u == user_id)
        }),
        StoreOp::ClearHistoryDefaults { history_id } => staged.retain(|a| {
            !matches!(a, Association::DefaultHistoryPermission { history_id: h, .. } if *h == history_id)
        }),
        StoreOp::ClearRoleMembers { role_id } => staged.retain(|a| match a {
            Association::UserRole { role_id: r, .. } | Association::GroupRole { role_id: r, .. } => {
                *r != role_id
            }
            _ => true,
        }),
    }
    Ok(())
}

impl PermissionStore for MemoryStore {
    async fn fetch_permission_records(
        &self,
        dataset_id: Uuid,
        action: Option<Action>,
    ) -> StoreResult<Vec<PermissionRecord>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .associations
            .iter()
            .filter_map(Association::as_permission_record)
            .filter(|r| r.dataset_id == dataset_id && action.map_or(true, |a| r.action == a))
            .collect())
    }

    async fn fetch_role_membership(&self, user_id: Uuid) -> StoreResult<HashSet<Uuid>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .associations
            .iter()
            .filter_map(|a| match a {
                Association::UserRole { user_id: u, role_id } if *u == user_id => Some(*role_id),
                _ => None,
            })
            .collect())
    }

    async fn fetch_user_roles(&self, user_id: Uuid) -> StoreResult<Vec<Role>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .associations
            .iter()
            .filter_map(|a| match a {
                Association::UserRole { user_id: u, role_id } if *u == user_id => {
                    state.role(*role_id).cloned()
                }
                _ => None,
            })
            .collect())
    }

    async fn fetch_role_members(&self, role_id: Uuid) -> StoreResult<RoleMembers> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut members = RoleMembers::default();
        for assoc in &state.associations {
            match assoc {
                Association::UserRole { user_id, role_id: r } if *r == role_id => {
                    members.users.push(*user_id);
                }
                Association::GroupRole { group_id, role_id: r } if *r == role_id => {
                    members.groups.push(*group_id);
                }
                _ => {}
            }
        }
        Ok(members)
    }

    async fn create_role(&self, role: NewRole) -> StoreResult<Role> {
        self.check_available()?;
        let role = Role {
            id: Uuid::new_v4(),
            name: role.name,
            description: role.description,
            role_type: role.role_type,
            created_at: Utc::now(),
        };
        self.state.write().await.roles.push(role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_id: Uuid) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let before = state.roles.len();
        state.roles.retain(|r| r.id != role_id);
        state
            .associations
            .retain(|a| a.role_id() != Some(role_id));
        Ok(state.roles.len() != before)
    }

    async fn find_role_by_name_and_type(
        &self,
        name: &str,
        role_type: RoleType,
    ) -> StoreResult<Option<Role>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .roles
            .iter()
            .find(|r| r.name == name && r.role_type == role_type)
            .cloned())
    }

    async fn create_association(&self, association: Association) -> StoreResult<Association> {
        self.check_available()?;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        apply_op(
            &state.roles,
            &mut state.associations,
            StoreOp::Create(association),
        )?;
        Ok(association)
    }

    async fn delete_association(&self, association: &Association) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let before = state.associations.len();
        state.associations.retain(|a| a != association);
        Ok(state.associations.len() != before)
    }

    async fn association_exists(&self, association: &Association) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.state.read().await.associations.contains(association))
    }

    async fn apply_batch(&self, ops: Vec<StoreOp>) -> StoreResult<()> {
        self.check_available()?;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut staged = state.associations.clone();
        for op in ops {
            apply_op(&state.roles, &mut staged, op)?;
        }
        state.associations = staged;
        Ok(())
    }

    async fn fetch_user_default_permissions(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<(Action, Uuid)>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .associations
            .iter()
            .filter_map(|a| match a {
                Association::DefaultUserPermission {
                    user_id: u,
                    action,
                    role_id,
                } if *u == user_id => Some((*action, *role_id)),
                _ => None,
            })
            .collect())
    }

    async fn fetch_history_default_permissions(
        &self,
        history_id: Uuid,
    ) -> StoreResult<Vec<(Action, Uuid)>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .associations
            .iter()
            .filter_map(|a| match a {
                Association::DefaultHistoryPermission {
                    history_id: h,
                    action,
                    role_id,
                } if *h == history_id => Some((*action, *role_id)),
                _ => None,
            })
            .collect())
    }

    async fn list_active_histories_of(&self, user_id: Uuid) -> StoreResult<Vec<History>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .histories
            .iter()
            .filter(|h| h.is_owned_by(user_id) && h.is_active())
            .cloned()
            .collect())
    }

    async fn list_datasets_of(
        &self,
        history_id: Uuid,
    ) -> StoreResult<Vec<HistoryDatasetAssociation>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .history_datasets
            .iter()
            .filter(|hda| hda.history_id == history_id)
            .cloned()
            .collect())
    }

    async fn has_library_association(&self, dataset_id: Uuid) -> StoreResult<bool> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .library_datasets
            .iter()
            .any(|lda| lda.dataset_id == dataset_id))
    }

    async fn history_associations_of(&self, dataset_id: Uuid) -> StoreResult<Vec<History>> {
        self.check_available()?;
        let state = self.state.read().await;
        let history_ids: HashSet<Uuid> = state
            .history_datasets
            .iter()
            .filter(|hda| hda.dataset_id == dataset_id)
            .map(|hda| hda.history_id)
            .collect();
        Ok(state
            .histories
            .iter()
            .filter(|h| history_ids.contains(&h.id))
            .cloned()
            .collect())
    }

    async fn list_folder_contents(&self, folder_id: Uuid) -> StoreResult<FolderContents> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(FolderContents {
            folders: state
                .folders
                .iter()
                .filter(|f| f.parent_id == Some(folder_id) && !f.deleted)
                .cloned()
                .collect(),
            datasets: state
                .library_datasets
                .iter()
                .filter(|lda| lda.folder_id == folder_id && !lda.deleted)
                .cloned()
                .collect(),
        })
    }
}
