//! Pluggable policy boundary.
//!
//! [`RbacAgent`] is what callers program against. Agents only override the
//! capabilities they resolve; the rest fail with
//! [`RbacError::UnsupportedOperation`] rather than silently allowing or
//! denying.

use rbac_types::{
    Action, ActionRegistry, Association, Dataset, History, PermissionMap, Role, User,
};

use crate::associations::AssociationRequest;
use crate::engine::RbacEngine;
use crate::error::{RbacError, RbacResult};
use crate::store::PermissionStore;

#[allow(async_fn_in_trait)]
pub trait RbacAgent {
    /// Actions this agent recognizes.
    fn registry(&self) -> &ActionRegistry;

    fn get_action(&self, name: &str) -> Option<Action> {
        self.registry().lookup(name)
    }

    fn get_actions(&self) -> &[Action] {
        self.registry().all()
    }

    /// Resolve untrusted action identifiers, dropping unknown ones.
    fn convert_permitted_action_strings<I, T>(&self, candidates: I) -> Vec<Action>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.registry().sanitize(candidates)
    }

    async fn allow_action(
        &self,
        _user: Option<&User>,
        _action: Action,
        _dataset: &Dataset,
    ) -> RbacResult<bool> {
        Err(RbacError::UnsupportedOperation("allow_action"))
    }

    async fn guess_derived_permissions(&self, _datasets: &[Dataset]) -> RbacResult<PermissionMap> {
        Err(RbacError::UnsupportedOperation("guess_derived_permissions"))
    }

    async fn associate_components(&self, _request: AssociationRequest) -> RbacResult<Association> {
        Err(RbacError::UnsupportedOperation("associate_components"))
    }

    async fn get_component_associations(
        &self,
        _request: AssociationRequest,
    ) -> RbacResult<Option<Association>> {
        Err(RbacError::UnsupportedOperation("get_component_associations"))
    }

    async fn components_are_associated(&self, request: AssociationRequest) -> RbacResult<bool> {
        Ok(self.get_component_associations(request).await?.is_some())
    }

    async fn create_private_user_role(&self, _user: &User) -> RbacResult<Role> {
        Err(RbacError::UnsupportedOperation("create_private_user_role"))
    }

    async fn get_private_user_role(
        &self,
        _user: &User,
        _auto_create: bool,
    ) -> RbacResult<Option<Role>> {
        Err(RbacError::UnsupportedOperation("get_private_user_role"))
    }

    async fn user_set_default_permissions(
        &self,
        _user: &User,
        _permissions: Option<&PermissionMap>,
        _apply_to_history: bool,
        _apply_to_dataset: bool,
    ) -> RbacResult<PermissionMap> {
        Err(RbacError::UnsupportedOperation("user_set_default_permissions"))
    }

    async fn history_set_default_permissions(
        &self,
        _history: &History,
        _permissions: Option<&PermissionMap>,
        _apply_to_dataset: bool,
        _bypass_manage_permission_check: bool,
    ) -> RbacResult<Option<PermissionMap>> {
        Err(RbacError::UnsupportedOperation("history_set_default_permissions"))
    }

    async fn set_dataset_permissions(
        &self,
        _dataset: &Dataset,
        _permissions: &PermissionMap,
    ) -> RbacResult<()> {
        Err(RbacError::UnsupportedOperation("set_dataset_permissions"))
    }
}

impl<S: PermissionStore> RbacAgent for RbacEngine<S> {
    fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    async fn allow_action(
        &self,
        user: Option<&User>,
        action: Action,
        dataset: &Dataset,
    ) -> RbacResult<bool> {
        self.is_allowed(user, action, dataset).await
    }

    async fn guess_derived_permissions(&self, datasets: &[Dataset]) -> RbacResult<PermissionMap> {
        Self::guess_derived_permissions(self, datasets).await
    }

    async fn associate_components(&self, request: AssociationRequest) -> RbacResult<Association> {
        Self::associate_components(self, request).await
    }

    async fn get_component_associations(
        &self,
        request: AssociationRequest,
    ) -> RbacResult<Option<Association>> {
        Self::get_component_associations(self, request).await
    }

    async fn components_are_associated(&self, request: AssociationRequest) -> RbacResult<bool> {
        Self::components_are_associated(self, request).await
    }

    async fn create_private_user_role(&self, user: &User) -> RbacResult<Role> {
        Self::create_private_user_role(self, user).await
    }

    async fn get_private_user_role(
        &self,
        user: &User,
        auto_create: bool,
    ) -> RbacResult<Option<Role>> {
        Self::get_private_user_role(self, user, auto_create).await
    }

    async fn user_set_default_permissions(
        &self,
        user: &User,
        permissions: Option<&PermissionMap>,
        apply_to_history: bool,
        apply_to_dataset: bool,
    ) -> RbacResult<PermissionMap> {
        Self::user_set_default_permissions(
            self,
            user,
            permissions,
            apply_to_history,
            apply_to_dataset,
        )
        .await
    }

    async fn history_set_default_permissions(
        &self,
        history: &History,
        permissions: Option<&PermissionMap>,
        apply_to_dataset: bool,
        bypass_manage_permission_check: bool,
    ) -> RbacResult<Option<PermissionMap>> {
        Self::history_set_default_permissions(
            self,
            history,
            permissions,
            apply_to_dataset,
            bypass_manage_permission_check,
        )
        .await
    }

    async fn set_dataset_permissions(
        &self,
        dataset: &Dataset,
        permissions: &PermissionMap,
    ) -> RbacResult<()> {
        Self::set_dataset_permissions(self, dataset, permissions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use uuid::Uuid;

    /// Agent that only knows the action catalog.
    struct CatalogOnly(ActionRegistry);

    impl RbacAgent for CatalogOnly {
        fn registry(&self) -> &ActionRegistry {
            &self.0
        }
    }

    #[tokio::test]
    async fn test_unresolved_capabilities_fail_loudly() {
        let agent = CatalogOnly(ActionRegistry::full());
        let dataset = Dataset { id: Uuid::new_v4() };

        let err = agent
            .allow_action(None, Action::DatasetAccess, &dataset)
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::UnsupportedOperation("allow_action")));

        let err = agent
            .components_are_associated(AssociationRequest::UserGroup {
                user_id: Uuid::new_v4(),
                group_id: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RbacError::UnsupportedOperation("get_component_associations")
        ));

        assert!(agent
            .set_dataset_permissions(&dataset, &PermissionMap::new())
            .await
            .is_err());
    }

    #[test]
    fn test_catalog_helpers() {
        let agent = CatalogOnly(ActionRegistry::full().filter_by_prefix("DATASET"));

        assert_eq!(agent.get_action("access"), Some(Action::DatasetAccess));
        assert_eq!(agent.get_actions().len(), 3);
        assert_eq!(
            agent.convert_permitted_action_strings(["DATASET_ACCESS", "bogus", "edit metadata"]),
            vec![Action::DatasetAccess, Action::DatasetEditMetadata]
        );
    }

    #[tokio::test]
    async fn test_engine_resolves_through_agent() {
        let engine = RbacEngine::new(MemoryStore::new());
        let dataset = Dataset { id: Uuid::new_v4() };

        assert!(RbacAgent::allow_action(&engine, None, Action::DatasetAccess, &dataset)
            .await
            .unwrap());
        assert!(!RbacAgent::allow_action(&engine, None, Action::DatasetEditMetadata, &dataset)
            .await
            .unwrap());
    }
}
