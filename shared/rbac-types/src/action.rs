//! Dataset actions and the action registry.
//!
//! Every action carries a composition model that decides both the
//! single-dataset default and how ancestor permissions combine on
//! derivation:
//! - `Grant`: denied unless a role requirement is satisfied
//! - `Restrict`: allowed unless a role requirement withdraws it

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// How role requirements on an action compose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionModel {
    /// Closed by default. Derived datasets keep only roles common to all ancestors.
    Grant,
    /// Open by default. Derived datasets accumulate every ancestor's roles.
    Restrict,
}

/// A permitted action on a dataset.
///
/// The catalog is fixed; actions are never created at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Edit a dataset's metadata in the library
    DatasetEditMetadata,
    /// Manage the roles associated with a dataset
    DatasetManagePermissions,
    /// Import a dataset into a history for analysis
    DatasetAccess,
}

impl Action {
    /// Registry key, e.g. `DATASET_ACCESS`.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::DatasetEditMetadata => "DATASET_EDIT_METADATA",
            Self::DatasetManagePermissions => "DATASET_MANAGE_PERMISSIONS",
            Self::DatasetAccess => "DATASET_ACCESS",
        }
    }

    /// Action name as stored on permission records.
    ///
    /// # Examples
    ///
    /// ```
    /// use rbac_types::Action;
    ///
    /// assert_eq!(Action::DatasetAccess.action_name(), "access");
    /// ```
    #[must_use]
    pub const fn action_name(&self) -> &'static str {
        match self {
            Self::DatasetEditMetadata => "edit metadata",
            Self::DatasetManagePermissions => "manage permissions",
            Self::DatasetAccess => "access",
        }
    }

    /// Returns a human-readable description of the action.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::DatasetEditMetadata => {
                "Role members can edit this dataset's metadata in the library"
            }
            Self::DatasetManagePermissions => {
                "Role members can manage the roles associated with this dataset"
            }
            Self::DatasetAccess => {
                "Role members can import this dataset into their history for analysis"
            }
        }
    }

    #[must_use]
    pub const fn model(&self) -> CompositionModel {
        match self {
            Self::DatasetEditMetadata | Self::DatasetManagePermissions => CompositionModel::Grant,
            Self::DatasetAccess => CompositionModel::Restrict,
        }
    }

    /// Returns the full catalog in declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::DatasetEditMetadata,
            Self::DatasetManagePermissions,
            Self::DatasetAccess,
        ]
    }

    /// Match either the registry key or the action name.
    fn matches(self, name: &str) -> bool {
        self.key() == name || self.action_name() == name
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.action_name())
    }
}

static GLOBAL_REGISTRY: OnceLock<ActionRegistry> = OnceLock::new();

/// An immutable set of actions an engine recognizes.
///
/// The process-wide registry holds the full catalog. Narrowed registries
/// are separate owned copies; the global one is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRegistry {
    actions: Vec<Action>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::full()
    }
}

impl ActionRegistry {
    /// Registry holding the full catalog.
    #[must_use]
    pub fn full() -> Self {
        Self {
            actions: Action::all().to_vec(),
        }
    }

    /// The process-wide registry, initialized on first use.
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get_or_init(Self::full)
    }

    /// Look up an action by registry key or action name.
    ///
    /// # Examples
    ///
    /// ```
    /// use rbac_types::{Action, ActionRegistry};
    ///
    /// let registry = ActionRegistry::global();
    /// assert_eq!(registry.lookup("DATASET_ACCESS"), Some(Action::DatasetAccess));
    /// assert_eq!(registry.lookup("manage permissions"), Some(Action::DatasetManagePermissions));
    /// assert_eq!(registry.lookup("delete"), None);
    /// ```
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Action> {
        self.actions.iter().copied().find(|a| a.matches(name))
    }

    #[must_use]
    pub fn all(&self) -> &[Action] {
        &self.actions
    }

    #[must_use]
    pub fn contains(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// Copy of this registry keeping only actions whose key starts with `prefix`.
    ///
    /// A prefix without a trailing `_` gets one appended, so `DATASET`
    /// matches `DATASET_ACCESS` but not `DATASETS_X`.
    #[must_use]
    pub fn filter_by_prefix(&self, prefix: &str) -> Self {
        let mut prefix = prefix.to_owned();
        if !prefix.ends_with('_') {
            prefix.push('_');
        }

        Self {
            actions: self
                .actions
                .iter()
                .copied()
                .filter(|a| a.key().starts_with(&prefix))
                .collect(),
        }
    }

    /// Resolve untrusted identifiers (e.g. form input), silently dropping unknowns.
    pub fn sanitize<I, S>(&self, candidates: I) -> Vec<Action>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .filter_map(|c| self.lookup(c.as_ref()))
            .collect()
    }
}
