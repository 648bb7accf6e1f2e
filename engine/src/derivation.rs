//! Permission derivation for datasets produced from other datasets.

use rbac_types::{AsDataset, CompositionModel, PermissionMap};
use tracing::debug;

use crate::engine::RbacEngine;
use crate::error::RbacResult;
use crate::store::PermissionStore;

/// Combine ancestor permission maps into the map a derived dataset inherits.
///
/// The first map seeds the result and an action seen for the first time is
/// taken as-is. When an action is already present:
/// - grant actions keep only roles common to both (intersection)
/// - restrict actions keep every role from both (union)
pub fn combine_permissions(maps: impl IntoIterator<Item = PermissionMap>) -> PermissionMap {
    let mut derived = PermissionMap::new();

    for map in maps {
        for (action, roles) in map {
            match derived.roles_mut(action) {
                None => derived.set(action, roles),
                Some(existing) => match action.model() {
                    CompositionModel::Grant => existing.retain(|r| roles.contains(r)),
                    CompositionModel::Restrict => existing.extend(roles),
                },
            }
        }
    }

    derived
}

impl<S: PermissionStore> RbacEngine<S> {
    /// Guess the permissions of a dataset derived from `datasets`.
    ///
    /// Each ancestor contributes its full map, with every action of the
    /// registry present. An empty ancestor list yields an empty map.
    pub async fn guess_derived_permissions<D: AsDataset>(
        &self,
        datasets: &[D],
    ) -> RbacResult<PermissionMap> {
        let mut maps = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            maps.push(self.get_dataset_permissions(dataset).await?);
        }

        let derived = combine_permissions(maps);
        debug!(
            ancestors = datasets.len(),
            actions = derived.len(),
            "Derived dataset permissions"
        );
        Ok(derived)
    }
}
