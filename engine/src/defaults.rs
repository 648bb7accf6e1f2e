//! Default-permission templates of users and histories.
//!
//! A user's template seeds the templates of their histories, and a history's
//! template is applied to the datasets it holds. Propagation never touches a
//! dataset that is also published in a library or shared into a history the
//! owner does not own.

use rbac_types::{Action, Association, History, PermissionMap, User};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::RbacEngine;
use crate::error::RbacResult;
use crate::store::{PermissionStore, StoreOp};

impl<S: PermissionStore> RbacEngine<S> {
    /// Replace the user's default-permission template.
    ///
    /// A missing or empty template defaults to managing permissions through
    /// the user's private role, which is created if needed. With
    /// `apply_to_history` the template is pushed to every active history of
    /// the user, and `apply_to_dataset` is forwarded to each of them.
    ///
    /// Returns the template that was stored.
    #[tracing::instrument(skip(self, user, permissions), fields(user_id = %user.id))]
    pub async fn user_set_default_permissions(
        &self,
        user: &User,
        permissions: Option<&PermissionMap>,
        apply_to_history: bool,
        apply_to_dataset: bool,
    ) -> RbacResult<PermissionMap> {
        let permissions = match permissions {
            Some(p) if !p.is_empty() => p.clone(),
            _ => self.private_role_template(user).await?,
        };

        let mut ops = vec![StoreOp::ClearUserDefaults { user_id: user.id }];
        ops.extend(permissions.rows().map(|(action, role_id)| {
            StoreOp::Create(Association::DefaultUserPermission {
                user_id: user.id,
                action,
                role_id,
            })
        }));
        self.store.apply_batch(ops).await?;
        info!(actions = permissions.len(), "Set user default permissions");

        if apply_to_history {
            let histories = self.store.list_active_histories_of(user.id).await?;
            debug!(histories = histories.len(), "Applying defaults to histories");
            for history in &histories {
                self.history_set_default_permissions(
                    history,
                    Some(&permissions),
                    apply_to_dataset,
                    false,
                )
                .await?;
            }
        }

        Ok(permissions)
    }

    /// The user's default-permission template, with every registry action present.
    pub async fn user_get_default_permissions(&self, user: &User) -> RbacResult<PermissionMap> {
        self.full_user_defaults(user.id).await
    }

    /// Replace a history's default-permission template.
    ///
    /// Ownerless histories are left alone and yield `None`. A missing or
    /// empty template falls back to the owner's full default map, so actions
    /// the owner never configured are cleared on applied datasets. With
    /// `apply_to_dataset`, the template also replaces the permissions of each
    /// dataset in the history that is not in a library, not held in a
    /// history of another user, and that the owner may manage (unless
    /// `bypass_manage_permission_check` is set).
    #[tracing::instrument(skip(self, history, permissions), fields(history_id = %history.id))]
    pub async fn history_set_default_permissions(
        &self,
        history: &History,
        permissions: Option<&PermissionMap>,
        apply_to_dataset: bool,
        bypass_manage_permission_check: bool,
    ) -> RbacResult<Option<PermissionMap>> {
        let Some(owner_id) = history.user_id else {
            debug!("History has no owner, skipping defaults");
            return Ok(None);
        };

        let permissions = match permissions {
            Some(p) if !p.is_empty() => p.clone(),
            _ => self.full_user_defaults(owner_id).await?,
        };

        let mut ops = vec![StoreOp::ClearHistoryDefaults {
            history_id: history.id,
        }];
        ops.extend(permissions.rows().map(|(action, role_id)| {
            StoreOp::Create(Association::DefaultHistoryPermission {
                history_id: history.id,
                action,
                role_id,
            })
        }));
        self.store.apply_batch(ops).await?;

        if apply_to_dataset {
            let mut applied = 0usize;
            for hda in self.store.list_datasets_of(history.id).await? {
                if !self
                    .accepts_history_defaults(owner_id, hda.dataset_id, bypass_manage_permission_check)
                    .await?
                {
                    continue;
                }
                self.set_dataset_permissions(&hda, &permissions).await?;
                applied += 1;
            }
            debug!(applied, "Applied history defaults to datasets");
        }

        Ok(Some(permissions))
    }

    /// The history's default-permission template, with every registry action present.
    pub async fn history_get_default_permissions(
        &self,
        history: &History,
    ) -> RbacResult<PermissionMap> {
        let rows = self
            .store
            .fetch_history_default_permissions(history.id)
            .await?;

        let mut permissions = PermissionMap::with_actions(self.registry.all());
        for (action, role_id) in rows {
            if self.registry.contains(action) {
                permissions.insert(action, role_id);
            }
        }
        Ok(permissions)
    }

    async fn full_user_defaults(&self, user_id: Uuid) -> RbacResult<PermissionMap> {
        let rows = self.store.fetch_user_default_permissions(user_id).await?;

        let mut permissions = PermissionMap::with_actions(self.registry.all());
        for (action, role_id) in rows {
            if self.registry.contains(action) {
                permissions.insert(action, role_id);
            }
        }
        Ok(permissions)
    }

    async fn private_role_template(&self, user: &User) -> RbacResult<PermissionMap> {
        let role = match self.get_private_user_role(user, false).await? {
            Some(role) => role,
            None => self.create_private_user_role(user).await?,
        };
        Ok(PermissionMap::single(
            Action::DatasetManagePermissions,
            [role.id],
        ))
    }

    /// Whether a history template may overwrite a dataset's permissions.
    async fn accepts_history_defaults(
        &self,
        owner_id: Uuid,
        dataset_id: Uuid,
        bypass_manage_permission_check: bool,
    ) -> RbacResult<bool> {
        if self.store.has_library_association(dataset_id).await? {
            debug!(%dataset_id, "Skipping library dataset");
            return Ok(false);
        }

        let holders = self.store.history_associations_of(dataset_id).await?;
        if holders.iter().any(|h| !h.is_owned_by(owner_id)) {
            debug!(%dataset_id, "Skipping dataset shared into another user's history");
            return Ok(false);
        }

        if bypass_manage_permission_check {
            return Ok(true);
        }
        self.is_allowed_for(Some(owner_id), Action::DatasetManagePermissions, dataset_id)
            .await
    }
}
