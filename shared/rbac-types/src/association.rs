//! Typed join rows between users, groups, roles, datasets and histories.
//!
//! Rows have no identity beyond their key tuple.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::permission::PermissionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Association {
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
    /// A role required for an action on a dataset.
    ActionDatasetRole {
        action: Action,
        dataset_id: Uuid,
        role_id: Uuid,
    },
    /// Default-permission template row of a user.
    DefaultUserPermission {
        user_id: Uuid,
        action: Action,
        role_id: Uuid,
    },
    /// Default-permission template row of a history.
    DefaultHistoryPermission {
        history_id: Uuid,
        action: Action,
        role_id: Uuid,
    },
}

impl Association {
    /// Short name of the row kind for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UserGroup { .. } => "user_group",
            Self::UserRole { .. } => "user_role",
            Self::GroupRole { .. } => "group_role",
            Self::ActionDatasetRole { .. } => "action_dataset_role",
            Self::DefaultUserPermission { .. } => "default_user_permission",
            Self::DefaultHistoryPermission { .. } => "default_history_permission",
        }
    }

    /// Dataset whose permission records this row belongs to, if any.
    #[must_use]
    pub const fn dataset_id(&self) -> Option<Uuid> {
        match self {
            Self::ActionDatasetRole { dataset_id, .. } => Some(*dataset_id),
            _ => None,
        }
    }

    /// Role this row references, if any.
    #[must_use]
    pub const fn role_id(&self) -> Option<Uuid> {
        match self {
            Self::UserRole { role_id, .. }
            | Self::GroupRole { role_id, .. }
            | Self::ActionDatasetRole { role_id, .. }
            | Self::DefaultUserPermission { role_id, .. }
            | Self::DefaultHistoryPermission { role_id, .. } => Some(*role_id),
            Self::UserGroup { .. } => None,
        }
    }

    #[must_use]
    pub const fn as_permission_record(&self) -> Option<PermissionRecord> {
        match self {
            Self::ActionDatasetRole {
                action,
                dataset_id,
                role_id,
            } => Some(PermissionRecord {
                action: *action,
                dataset_id: *dataset_id,
                role_id: *role_id,
            }),
            _ => None,
        }
    }
}

impl From<PermissionRecord> for Association {
    fn from(record: PermissionRecord) -> Self {
        Self::ActionDatasetRole {
            action: record.action,
            dataset_id: record.dataset_id,
            role_id: record.role_id,
        }
    }
}
