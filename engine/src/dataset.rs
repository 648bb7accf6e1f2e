//! Reading and replacing the permission records of a dataset.

use rbac_types::{AsDataset, Association, PermissionMap};
use tracing::debug;
use uuid::Uuid;

use crate::engine::RbacEngine;
use crate::error::RbacResult;
use crate::store::{PermissionStore, StoreOp};

impl<S: PermissionStore> RbacEngine<S> {
    /// Full permission map of a dataset.
    ///
    /// Every registry action is present, with an empty set when the dataset
    /// has no records for it. Records for actions outside the registry are
    /// left out.
    pub async fn get_dataset_permissions<D: AsDataset + ?Sized>(
        &self,
        dataset: &D,
    ) -> RbacResult<PermissionMap> {
        let records = self
            .store
            .fetch_permission_records(dataset.dataset_id(), None)
            .await?;

        let mut permissions = PermissionMap::with_actions(self.registry.all());
        for record in records {
            if self.registry.contains(record.action) {
                permissions.insert(record.action, record.role_id);
            }
        }
        Ok(permissions)
    }

    /// Replace the records of every action present in `permissions`.
    ///
    /// Actions absent from the map are untouched; an action mapped to an
    /// empty set is cleared. The deletes and inserts go to the store as a
    /// single batch.
    pub async fn set_dataset_permissions<D: AsDataset + ?Sized>(
        &self,
        dataset: &D,
        permissions: &PermissionMap,
    ) -> RbacResult<()> {
        self.replace_dataset_permissions(dataset.dataset_id(), permissions)
            .await
    }

    #[tracing::instrument(skip(self, permissions), fields(actions = permissions.len()))]
    async fn replace_dataset_permissions(
        &self,
        dataset_id: Uuid,
        permissions: &PermissionMap,
    ) -> RbacResult<()> {
        if permissions.is_empty() {
            return Ok(());
        }

        let mut ops: Vec<StoreOp> = permissions
            .actions()
            .map(|action| StoreOp::ClearDatasetAction { dataset_id, action })
            .collect();
        ops.extend(permissions.rows().map(|(action, role_id)| {
            StoreOp::Create(Association::ActionDatasetRole {
                action,
                dataset_id,
                role_id,
            })
        }));

        self.store.apply_batch(ops).await?;
        debug!("Replaced dataset permissions");
        Ok(())
    }

    /// Make `dst` require exactly the roles `src` requires.
    pub async fn copy_dataset_permissions<A, B>(&self, src: &A, dst: &B) -> RbacResult<()>
    where
        A: AsDataset + ?Sized,
        B: AsDataset + ?Sized,
    {
        let permissions = self.get_dataset_permissions(src).await?;
        self.set_dataset_permissions(dst, &permissions).await
    }
}
