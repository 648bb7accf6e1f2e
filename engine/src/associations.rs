//! Memberships, dataset role requirements, private and sharing roles.

use std::collections::HashSet;
use std::fmt;

use rbac_types::{
    Action, AsDataset, Association, NewRole, PermissionMap, Role, RoleType, User,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::RbacEngine;
use crate::error::{RbacError, RbacResult};
use crate::store::{PermissionStore, StoreOp};

/// Loosely-typed association components, as received from callers that
/// only know which ids they hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentSet {
    pub user: Option<Uuid>,
    pub group: Option<Uuid>,
    pub role: Option<Uuid>,
    pub action: Option<Action>,
    pub dataset: Option<Uuid>,
}

impl fmt::Display for ComponentSet {
    /// Lists the present component names, e.g. `{user, role}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = [
            ("user", self.user.is_some()),
            ("group", self.group.is_some()),
            ("role", self.role.is_some()),
            ("action", self.action.is_some()),
            ("dataset", self.dataset.is_some()),
        ];
        let names: Vec<&str> = present
            .iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| *name)
            .collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// A routable association request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRequest {
    UserGroup {
        user_id: Uuid,
        group_id: Uuid,
    },
    UserRole {
        user_id: Uuid,
        role_id: Uuid,
    },
    GroupRole {
        group_id: Uuid,
        role_id: Uuid,
    },
    ActionDatasetRole {
        action: Action,
        dataset_id: Uuid,
        role_id: Uuid,
    },
}

impl AssociationRequest {
    /// Route loosely-typed components to a request kind.
    ///
    /// Precedence, first match wins:
    /// 1. user + group
    /// 2. user + role
    /// 3. group + role, with no user
    /// 4. action + dataset + role
    ///
    /// # Examples
    ///
    /// ```
    /// use rbac_engine::{AssociationRequest, ComponentSet};
    /// use uuid::Uuid;
    ///
    /// let (user, group, role) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    /// let request = AssociationRequest::from_components(ComponentSet {
    ///     user: Some(user),
    ///     group: Some(group),
    ///     role: Some(role),
    ///     ..ComponentSet::default()
    /// })
    /// .unwrap();
    /// assert_eq!(request, AssociationRequest::UserGroup { user_id: user, group_id: group });
    /// ```
    pub fn from_components(components: ComponentSet) -> RbacResult<Self> {
        match components {
            ComponentSet {
                user: Some(user_id),
                group: Some(group_id),
                ..
            } => Ok(Self::UserGroup { user_id, group_id }),
            ComponentSet {
                user: Some(user_id),
                role: Some(role_id),
                ..
            } => Ok(Self::UserRole { user_id, role_id }),
            ComponentSet {
                user: None,
                group: Some(group_id),
                role: Some(role_id),
                ..
            } => Ok(Self::GroupRole { group_id, role_id }),
            ComponentSet {
                action: Some(action),
                dataset: Some(dataset_id),
                role: Some(role_id),
                ..
            } => Ok(Self::ActionDatasetRole {
                action,
                dataset_id,
                role_id,
            }),
            _ => Err(RbacError::InvalidAssociationRequest(components)),
        }
    }

    #[must_use]
    pub const fn into_association(self) -> Association {
        match self {
            Self::UserGroup { user_id, group_id } => Association::UserGroup { user_id, group_id },
            Self::UserRole { user_id, role_id } => Association::UserRole { user_id, role_id },
            Self::GroupRole { group_id, role_id } => Association::GroupRole { group_id, role_id },
            Self::ActionDatasetRole {
                action,
                dataset_id,
                role_id,
            } => Association::ActionDatasetRole {
                action,
                dataset_id,
                role_id,
            },
        }
    }
}

impl TryFrom<ComponentSet> for AssociationRequest {
    type Error = RbacError;

    fn try_from(components: ComponentSet) -> RbacResult<Self> {
        Self::from_components(components)
    }
}

impl<S: PermissionStore> RbacEngine<S> {
    pub async fn associate_user_group(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> RbacResult<Association> {
        self.associate_components(AssociationRequest::UserGroup { user_id, group_id })
            .await
    }

    pub async fn associate_user_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> RbacResult<Association> {
        self.associate_components(AssociationRequest::UserRole { user_id, role_id })
            .await
    }

    pub async fn associate_group_role(
        &self,
        group_id: Uuid,
        role_id: Uuid,
    ) -> RbacResult<Association> {
        self.associate_components(AssociationRequest::GroupRole { group_id, role_id })
            .await
    }

    pub async fn associate_action_dataset_role<D: AsDataset + ?Sized>(
        &self,
        action: Action,
        dataset: &D,
        role_id: Uuid,
    ) -> RbacResult<Association> {
        self.associate_components(AssociationRequest::ActionDatasetRole {
            action,
            dataset_id: dataset.dataset_id(),
            role_id,
        })
        .await
    }

    /// Persist the association described by `request`.
    #[tracing::instrument(skip(self))]
    pub async fn associate_components(
        &self,
        request: AssociationRequest,
    ) -> RbacResult<Association> {
        let association = self
            .store
            .create_association(request.into_association())
            .await?;
        debug!(kind = association.kind(), "Created association");
        Ok(association)
    }

    /// Remove an association. Returns `true` if a row was deleted.
    #[tracing::instrument(skip(self))]
    pub async fn disassociate(&self, association: Association) -> RbacResult<bool> {
        Ok(self.store.delete_association(&association).await?)
    }

    /// The persisted association matching `request`, if any.
    pub async fn get_component_associations(
        &self,
        request: AssociationRequest,
    ) -> RbacResult<Option<Association>> {
        let association = request.into_association();
        if self.store.association_exists(&association).await? {
            Ok(Some(association))
        } else {
            Ok(None)
        }
    }

    pub async fn components_are_associated(&self, request: AssociationRequest) -> RbacResult<bool> {
        Ok(self.get_component_associations(request).await?.is_some())
    }

    /// Create the user's private role and make the user its only member.
    ///
    /// If the membership cannot be written the role is deleted again.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_private_user_role(&self, user: &User) -> RbacResult<Role> {
        let role = self
            .store
            .create_role(NewRole {
                name: user.email.clone(),
                description: Some(format!("{}{}", self.config.private_role_prefix, user.email)),
                role_type: RoleType::Private,
            })
            .await?;
        if let Err(err) = self.associate_user_role(user.id, role.id).await {
            self.discard_role(&role).await;
            return Err(err);
        }

        info!(role_id = %role.id, "Created private role");
        Ok(role)
    }

    /// The user's private role, created on demand when `auto_create` is set.
    pub async fn get_private_user_role(
        &self,
        user: &User,
        auto_create: bool,
    ) -> RbacResult<Option<Role>> {
        let existing = self
            .store
            .find_role_by_name_and_type(&user.email, RoleType::Private)
            .await?;

        match existing {
            Some(role) => Ok(Some(role)),
            None if auto_create => Ok(Some(self.create_private_user_role(user).await?)),
            None => Ok(None),
        }
    }

    /// Assign `users` and `groups` to each role.
    ///
    /// With `delete_existing`, each role's current members are replaced in the
    /// same batch as the new memberships are written.
    #[tracing::instrument(skip(self))]
    pub async fn set_entity_role_associations(
        &self,
        roles: &[Uuid],
        users: &[Uuid],
        groups: &[Uuid],
        delete_existing: bool,
    ) -> RbacResult<()> {
        for role_id in roles.iter().copied() {
            let mut ops = Vec::with_capacity(users.len() + groups.len() + 1);
            if delete_existing {
                ops.push(StoreOp::ClearRoleMembers { role_id });
            }
            ops.extend(
                users
                    .iter()
                    .map(|&user_id| StoreOp::Create(Association::UserRole { user_id, role_id })),
            );
            ops.extend(
                groups
                    .iter()
                    .map(|&group_id| StoreOp::Create(Association::GroupRole { group_id, role_id })),
            );
            self.store.apply_batch(ops).await?;
        }
        Ok(())
    }

    /// Restrict access on a dataset to exactly `users`.
    ///
    /// Reuses an existing sharing role whose user members are all in `users`,
    /// otherwise creates one. The role becomes the only access requirement.
    #[tracing::instrument(skip_all, fields(dataset_id = %dataset.dataset_id(), users = users.len()))]
    pub async fn privately_share_dataset<D: AsDataset + ?Sized>(
        &self,
        dataset: &D,
        users: &[User],
    ) -> RbacResult<Role> {
        let role = match self.find_sharing_role(users).await? {
            Some(role) => {
                debug!(role_id = %role.id, "Reusing sharing role");
                role
            }
            None => self.create_sharing_role(users).await?,
        };

        self.set_dataset_permissions(
            dataset,
            &PermissionMap::single(Action::DatasetAccess, [role.id]),
        )
        .await?;

        info!(role_id = %role.id, "Privately shared dataset");
        Ok(role)
    }

    /// First sharing role held by every user whose user members are all in `users`.
    async fn find_sharing_role(&self, users: &[User]) -> RbacResult<Option<Role>> {
        let Some((first, rest)) = users.split_first() else {
            return Ok(None);
        };

        let mut candidates: Vec<Role> = self
            .store
            .fetch_user_roles(first.id)
            .await?
            .into_iter()
            .filter(|r| r.role_type == RoleType::Sharing)
            .collect();

        for user in rest {
            if candidates.is_empty() {
                break;
            }
            let held: HashSet<Uuid> = self
                .store
                .fetch_user_roles(user.id)
                .await?
                .into_iter()
                .filter(|r| r.role_type == RoleType::Sharing)
                .map(|r| r.id)
                .collect();
            candidates.retain(|r| held.contains(&r.id));
        }

        let wanted: HashSet<Uuid> = users.iter().map(|u| u.id).collect();
        for role in candidates {
            let members = self.store.fetch_role_members(role.id).await?;
            if members.users.iter().all(|u| wanted.contains(u)) {
                return Ok(Some(role));
            }
        }
        Ok(None)
    }

    async fn create_sharing_role(&self, users: &[User]) -> RbacResult<Role> {
        if users.is_empty() {
            warn!("Creating sharing role with no members");
        }

        let emails: Vec<&str> = users.iter().map(|u| u.email.as_str()).collect();
        let name = format!("{}{}", self.config.sharing_role_prefix, emails.join(", "));
        let role = self
            .store
            .create_role(NewRole {
                description: Some(name.clone()),
                name,
                role_type: RoleType::Sharing,
            })
            .await?;

        let ops = users
            .iter()
            .map(|u| {
                StoreOp::Create(Association::UserRole {
                    user_id: u.id,
                    role_id: role.id,
                })
            })
            .collect();
        if let Err(err) = self.store.apply_batch(ops).await {
            self.discard_role(&role).await;
            return Err(err.into());
        }

        info!(role_id = %role.id, members = users.len(), "Created sharing role");
        Ok(role)
    }

    /// Delete a role whose memberships failed to be written.
    async fn discard_role(&self, role: &Role) {
        match self.store.delete_role(role.id).await {
            Ok(_) => debug!(role_id = %role.id, "Discarded role without members"),
            Err(err) => warn!(role_id = %role.id, error = %err, "Failed to discard role"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid, Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_user_and_group_wins_over_role() {
        let (user, group, role, _) = ids();
        let request = AssociationRequest::from_components(ComponentSet {
            user: Some(user),
            group: Some(group),
            role: Some(role),
            ..ComponentSet::default()
        })
        .unwrap();
        assert_eq!(
            request,
            AssociationRequest::UserGroup {
                user_id: user,
                group_id: group
            }
        );
    }

    #[test]
    fn test_user_and_role_wins_over_dataset() {
        let (user, role, dataset, _) = ids();
        let request = AssociationRequest::from_components(ComponentSet {
            user: Some(user),
            role: Some(role),
            action: Some(Action::DatasetAccess),
            dataset: Some(dataset),
            ..ComponentSet::default()
        })
        .unwrap();
        assert_eq!(
            request,
            AssociationRequest::UserRole {
                user_id: user,
                role_id: role
            }
        );
    }

    #[test]
    fn test_group_and_role() {
        let (group, role, _, _) = ids();
        let request = AssociationRequest::try_from(ComponentSet {
            group: Some(group),
            role: Some(role),
            ..ComponentSet::default()
        })
        .unwrap();
        assert_eq!(
            request,
            AssociationRequest::GroupRole {
                group_id: group,
                role_id: role
            }
        );
    }

    #[test]
    fn test_action_dataset_role() {
        let (dataset, role, _, _) = ids();
        let request = AssociationRequest::from_components(ComponentSet {
            action: Some(Action::DatasetEditMetadata),
            dataset: Some(dataset),
            role: Some(role),
            ..ComponentSet::default()
        })
        .unwrap();
        assert_eq!(
            request.into_association().dataset_id(),
            Some(dataset)
        );
    }

    #[test]
    fn test_unroutable_components_are_rejected() {
        let (user, dataset, _, _) = ids();
        let components = ComponentSet {
            user: Some(user),
            dataset: Some(dataset),
            ..ComponentSet::default()
        };

        let err = AssociationRequest::from_components(components).unwrap_err();
        assert!(matches!(err, RbacError::InvalidAssociationRequest(c) if c == components));

        assert!(AssociationRequest::from_components(ComponentSet::default()).is_err());
        // Dataset without action cannot be routed
        assert!(AssociationRequest::from_components(ComponentSet {
            dataset: Some(dataset),
            role: Some(Uuid::new_v4()),
            ..ComponentSet::default()
        })
        .is_err());
    }

    #[test]
    fn test_component_set_display() {
        let components = ComponentSet {
            user: Some(Uuid::nil()),
            role: Some(Uuid::nil()),
            ..ComponentSet::default()
        };
        assert_eq!(components.to_string(), "{user, role}");
        assert_eq!(ComponentSet::default().to_string(), "{}");
    }
}
