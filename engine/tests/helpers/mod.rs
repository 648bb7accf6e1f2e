//! Reusable fixtures for engine integration tests.
//!
//! Provides `TestEnv`, an engine over an in-memory store, plus helpers to
//! create users, roles, histories and library trees. `RecordingStore` wraps
//! the in-memory store to observe reads and inject failures.
//!
//! Set `RUST_LOG=rbac_engine=debug` to see decision traces.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once};

use rbac_engine::types::{
    FolderContents, Group, History, HistoryDatasetAssociation, Library, LibraryDatasetAssociation,
    LibraryFolder, NewRole, PermissionRecord, RoleMembers,
};
use rbac_engine::{
    Action, Association, Dataset, EngineConfig, MemoryStore, PermissionMap, PermissionStore,
    RbacEngine, Role, RoleType, StoreError, StoreOp, StoreResult, User,
};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

static TRACING: Once = Once::new();

/// Install a test subscriber once per binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Test environment
// ============================================================================

/// Stores that expose the in-memory store holding fixture data.
pub trait Fixtures: PermissionStore {
    fn memory(&self) -> &MemoryStore;
}

impl Fixtures for MemoryStore {
    fn memory(&self) -> &MemoryStore {
        self
    }
}

pub struct TestEnv<S = MemoryStore> {
    pub engine: RbacEngine<S>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        Self {
            engine: RbacEngine::with_config(MemoryStore::new(), config),
        }
    }

    pub fn dataset() -> Dataset {
        Dataset { id: Uuid::new_v4() }
    }
}

impl TestEnv<RecordingStore> {
    /// Environment whose engine reads through a `RecordingStore`.
    pub fn recording() -> Self {
        init_tracing();
        Self {
            engine: RbacEngine::new(RecordingStore::new()),
        }
    }

    pub fn recorder(&self) -> &RecordingStore {
        self.engine.store()
    }
}

impl<S: Fixtures> TestEnv<S> {
    pub fn store(&self) -> &MemoryStore {
        self.engine.store().memory()
    }

    /// Create and register a user with a unique email.
    pub async fn user(&self, name: &str) -> User {
        let test_id = Uuid::new_v4().to_string()[..8].to_string();
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{name}_{test_id}@example.org"),
        };
        self.store().add_user(user.clone()).await;
        user
    }

    pub async fn group(&self, name: &str) -> Group {
        let group = Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.store().add_group(group.clone()).await;
        group
    }

    pub async fn role(&self, name: &str) -> Role {
        self.store()
            .create_role(NewRole {
                name: name.to_string(),
                description: None,
                role_type: RoleType::Generic,
            })
            .await
            .expect("failed to create role")
    }

    /// Create a generic role and give it to each user.
    pub async fn role_held_by(&self, name: &str, users: &[&User]) -> Role {
        let role = self.role(name).await;
        for user in users {
            self.engine
                .associate_user_role(user.id, role.id)
                .await
                .expect("failed to associate user role");
        }
        role
    }

    /// Give a dataset its permissions for a set of actions.
    pub async fn require(&self, dataset: &Dataset, action: Action, roles: &[&Role]) {
        self.engine
            .set_dataset_permissions(dataset, &PermissionMap::single(action, roles.iter().map(|r| r.id)))
            .await
            .expect("failed to set dataset permissions");
    }

    pub async fn allowed(&self, user: Option<&User>, action: Action, dataset: &Dataset) -> bool {
        self.engine
            .is_allowed(user, action, dataset)
            .await
            .expect("decision failed")
    }

    pub async fn history(&self, owner: Option<&User>) -> History {
        let history = History {
            id: Uuid::new_v4(),
            user_id: owner.map(|u| u.id),
            name: "Unnamed history".to_string(),
            deleted: false,
        };
        self.store().add_history(history.clone()).await;
        history
    }

    pub async fn deleted_history(&self, owner: &User) -> History {
        let history = History {
            id: Uuid::new_v4(),
            user_id: Some(owner.id),
            name: "Deleted history".to_string(),
            deleted: true,
        };
        self.store().add_history(history.clone()).await;
        history
    }

    /// Place a dataset in a history.
    pub async fn add_to_history(
        &self,
        history: &History,
        dataset: &Dataset,
    ) -> HistoryDatasetAssociation {
        let hda = HistoryDatasetAssociation {
            id: Uuid::new_v4(),
            history_id: history.id,
            dataset_id: dataset.id,
            name: "dataset.txt".to_string(),
        };
        self.store().add_history_dataset(hda.clone()).await;
        hda
    }

    pub async fn library(&self, name: &str) -> Library {
        let root = self.folder(None, name).await;
        let library = Library {
            id: Uuid::new_v4(),
            name: name.to_string(),
            root_folder_id: root.id,
        };
        self.store().add_library(library.clone()).await;
        library
    }

    pub async fn folder(&self, parent: Option<Uuid>, name: &str) -> LibraryFolder {
        let folder = LibraryFolder {
            id: Uuid::new_v4(),
            parent_id: parent,
            name: name.to_string(),
            deleted: false,
        };
        self.store().add_folder(folder.clone()).await;
        folder
    }

    /// Place a dataset in a library folder.
    pub async fn add_to_folder(&self, folder_id: Uuid, dataset: &Dataset) -> LibraryDatasetAssociation {
        let lda = LibraryDatasetAssociation {
            id: Uuid::new_v4(),
            folder_id,
            dataset_id: dataset.id,
            name: "dataset.txt".to_string(),
            deleted: false,
        };
        self.store().add_library_dataset(lda.clone()).await;
        lda
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Recording store
// ============================================================================

/// In-memory store that records folder reads, can hold one permission-record
/// read in flight, and can fail membership writes.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    folder_reads: Mutex<Vec<Uuid>>,
    hold_record_read: AtomicBool,
    read_held: Notify,
    read_released: Notify,
    fail_membership_writes: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Folders listed so far, in visit order.
    pub fn folder_reads(&self) -> Vec<Uuid> {
        self.folder_reads.lock().expect("folder reads poisoned").clone()
    }

    /// Park the next permission-record read after it has fetched its rows.
    pub fn hold_next_record_read(&self) {
        self.hold_record_read.store(true, Ordering::SeqCst);
    }

    /// Wait until a held read has fetched its rows and parked.
    pub async fn wait_for_held_read(&self) {
        self.read_held.notified().await;
    }

    pub fn release_held_read(&self) {
        self.read_released.notify_one();
    }

    /// Make role membership writes fail with a conflict.
    pub fn fail_membership_writes(&self, fail: bool) {
        self.fail_membership_writes.store(fail, Ordering::SeqCst);
    }

    fn check_membership_write<'a>(
        &self,
        mut associations: impl Iterator<Item = &'a Association>,
    ) -> StoreResult<()> {
        let membership = associations.any(|a| {
            matches!(
                a,
                Association::UserRole { .. } | Association::GroupRole { .. }
            )
        });
        if membership && self.fail_membership_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict("membership writes disabled".to_string()));
        }
        Ok(())
    }
}

impl Fixtures for RecordingStore {
    fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

impl PermissionStore for RecordingStore {
    async fn fetch_permission_records(
        &self,
        dataset_id: Uuid,
        action: Option<Action>,
    ) -> StoreResult<Vec<PermissionRecord>> {
        let records = self.inner.fetch_permission_records(dataset_id, action).await?;
        if self.hold_record_read.swap(false, Ordering::SeqCst) {
            self.read_held.notify_one();
            self.read_released.notified().await;
        }
        Ok(records)
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
        self.inner.delete_role(role_id).await
    }

    async fn find_role_by_name_and_type(
        &self,
        name: &str,
        role_type: RoleType,
    ) -> StoreResult<Option<Role>> {
        self.inner.find_role_by_name_and_type(name, role_type).await
    }

    async fn create_association(&self, association: Association) -> StoreResult<Association> {
        self.check_membership_write(std::iter::once(&association))?;
        self.inner.create_association(association).await
    }

    async fn delete_association(&self, association: &Association) -> StoreResult<bool> {
        self.inner.delete_association(association).await
    }

    async fn association_exists(&self, association: &Association) -> StoreResult<bool> {
        self.inner.association_exists(association).await
    }

    async fn apply_batch(&self, ops: Vec<StoreOp>) -> StoreResult<()> {
        self.check_membership_write(ops.iter().filter_map(|op| match op {
            StoreOp::Create(a) => Some(a),
            _ => None,
        }))?;
        self.inner.apply_batch(ops).await
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
        self.folder_reads
            .lock()
            .expect("folder reads poisoned")
            .push(folder_id);
        self.inner.list_folder_contents(folder_id).await
    }
}
