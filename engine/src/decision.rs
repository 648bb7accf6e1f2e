//! Permission decision logic.
//!
//! Decides whether a subject may perform an action on a dataset.

use std::collections::HashSet;

use rbac_types::{Action, AsDataset, CompositionModel, PermissionRecord, User};
use tracing::debug;
use uuid::Uuid;

use crate::engine::RbacEngine;
use crate::error::RbacResult;
use crate::store::PermissionStore;

/// Decide an action given the roles it requires on a dataset.
///
/// `held_roles` is `None` for an anonymous subject.
///
/// Resolution order:
/// 1. Anonymous subjects may only access datasets with no access requirement
/// 2. No requirement: restrict actions are open, grant actions are closed
/// 3. Otherwise the subject must hold every required role
pub fn decide(
    action: Action,
    held_roles: Option<&HashSet<Uuid>>,
    required: &[PermissionRecord],
) -> bool {
    match held_roles {
        // Anonymous subjects can never satisfy a role requirement
        None => action == Action::DatasetAccess && required.is_empty(),
        Some(_) if required.is_empty() => action.model() == CompositionModel::Restrict,
        Some(held) => required.iter().all(|r| held.contains(&r.role_id)),
    }
}

impl<S: PermissionStore> RbacEngine<S> {
    /// Check whether `user` may perform `action` on a dataset.
    ///
    /// Store failures are returned as errors, never as a decision. Actions
    /// outside this engine's registry are denied.
    pub async fn is_allowed<D: AsDataset + ?Sized>(
        &self,
        user: Option<&User>,
        action: Action,
        dataset: &D,
    ) -> RbacResult<bool> {
        self.is_allowed_for(user.map(|u| u.id), action, dataset.dataset_id())
            .await
    }

    /// [`is_allowed`](Self::is_allowed) keyed by user id.
    #[tracing::instrument(skip(self))]
    pub async fn is_allowed_for(
        &self,
        user_id: Option<Uuid>,
        action: Action,
        dataset_id: Uuid,
    ) -> RbacResult<bool> {
        if !self.registry.contains(action) {
            debug!("Action not in registry, denying");
            return Ok(false);
        }

        let required = self
            .store
            .fetch_permission_records(dataset_id, Some(action))
            .await?;

        let allowed = match user_id {
            None => decide(action, None, &required),
            // No requirement to satisfy, skip the membership read
            Some(_) if required.is_empty() => decide(action, Some(&HashSet::new()), &required),
            Some(user_id) => {
                let held = self.store.fetch_role_membership(user_id).await?;
                decide(action, Some(&held), &required)
            }
        };

        debug!(allowed, required = required.len(), "Evaluated dataset action");
        Ok(allowed)
    }
}
