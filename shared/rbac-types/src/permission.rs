//! Per-action role requirements.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;

/// A role required for an action on a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub action: Action,
    pub dataset_id: Uuid,
    pub role_id: Uuid,
}

/// Mapping from action to the set of role ids required for it.
///
/// Used for a dataset's permissions, for default-permission templates and
/// for derivation results. An action mapped to an empty set carries no
/// requirement; when passed to a setter it clears the action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<Action, BTreeSet<Uuid>>);

impl PermissionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with every given action present and no roles.
    pub fn with_actions<'a>(actions: impl IntoIterator<Item = &'a Action>) -> Self {
        Self(
            actions
                .into_iter()
                .map(|a| (*a, BTreeSet::new()))
                .collect(),
        )
    }

    /// Build a map from `(action, role)` rows, merging duplicates.
    pub fn from_rows(rows: impl IntoIterator<Item = (Action, Uuid)>) -> Self {
        let mut map = Self::new();
        for (action, role_id) in rows {
            map.insert(action, role_id);
        }
        map
    }

    /// Single-action map.
    ///
    /// # Examples
    ///
    /// ```
    /// use rbac_types::{Action, PermissionMap};
    /// use uuid::Uuid;
    ///
    /// let role = Uuid::new_v4();
    /// let map = PermissionMap::single(Action::DatasetAccess, [role]);
    /// assert!(map.roles(Action::DatasetAccess).unwrap().contains(&role));
    /// ```
    pub fn single(action: Action, roles: impl IntoIterator<Item = Uuid>) -> Self {
        let mut map = Self::new();
        map.set(action, roles);
        map
    }

    /// Add one required role, creating the action entry if needed.
    pub fn insert(&mut self, action: Action, role_id: Uuid) {
        self.0.entry(action).or_default().insert(role_id);
    }

    /// Replace the role set of an action.
    pub fn set(&mut self, action: Action, roles: impl IntoIterator<Item = Uuid>) {
        self.0.insert(action, roles.into_iter().collect());
    }

    /// Ensure an action is present, without adding roles.
    pub fn touch(&mut self, action: Action) {
        self.0.entry(action).or_default();
    }

    #[must_use]
    pub fn roles(&self, action: Action) -> Option<&BTreeSet<Uuid>> {
        self.0.get(&action)
    }

    pub fn roles_mut(&mut self, action: Action) -> Option<&mut BTreeSet<Uuid>> {
        self.0.get_mut(&action)
    }

    #[must_use]
    pub fn contains_action(&self, action: Action) -> bool {
        self.0.contains_key(&action)
    }

    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Action, BTreeSet<Uuid>> {
        self.0.iter()
    }

    /// Flatten into `(action, role)` rows.
    pub fn rows(&self) -> impl Iterator<Item = (Action, Uuid)> + '_ {
        self.0
            .iter()
            .flat_map(|(action, roles)| roles.iter().map(move |r| (*action, *r)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether no action carries any role.
    #[must_use]
    pub fn has_no_roles(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(Action, BTreeSet<Uuid>)> for PermissionMap {
    fn from_iter<T: IntoIterator<Item = (Action, BTreeSet<Uuid>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PermissionMap {
    type Item = (Action, BTreeSet<Uuid>);
    type IntoIter = btree_map::IntoIter<Action, BTreeSet<Uuid>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PermissionMap {
    type Item = (&'a Action, &'a BTreeSet<Uuid>);
    type IntoIter = btree_map::Iter<'a, Action, BTreeSet<Uuid>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
