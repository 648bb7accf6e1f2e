//! Entity models for the permission system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    /// Exactly one per user, named after the user's email
    Private,
    /// Fixed set of users a dataset was privately shared with
    Sharing,
    /// Administratively managed role
    Generic,
}

/// Role that can be required on dataset actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub role_type: RoleType,
    pub created_at: DateTime<Utc>,
}

/// Role creation request passed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub role_type: RoleType,
}

/// Direct members of a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMembers {
    pub users: Vec<Uuid>,
    pub groups: Vec<Uuid>,
}

/// Authenticated user. Anonymous subjects are represented by `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
}

/// The canonical protected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
}

/// Container of dataset associations owned by (at most) one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub deleted: bool,
}

impl History {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Whether `user_id` owns this history.
    #[must_use]
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

/// A dataset placed in a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryDatasetAssociation {
    pub id: Uuid,
    pub history_id: Uuid,
    pub dataset_id: Uuid,
    pub name: String,
}

/// A dataset placed in a library folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDatasetAssociation {
    pub id: Uuid,
    pub folder_id: Uuid,
    pub dataset_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    pub root_folder_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryFolder {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Active children of a library folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderContents {
    pub folders: Vec<LibraryFolder>,
    pub datasets: Vec<LibraryDatasetAssociation>,
}

/// Node of a library tree passed to folder visibility checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEntry {
    Library(Library),
    Folder(LibraryFolder),
    Dataset(LibraryDatasetAssociation),
}

/// Anything that resolves to the underlying dataset.
///
/// Permission records always live on the dataset, so wrappers such as
/// history or library associations are normalized through this trait.
pub trait AsDataset {
    fn dataset_id(&self) -> Uuid;
}

impl AsDataset for Uuid {
    fn dataset_id(&self) -> Uuid {
        *self
    }
}

impl AsDataset for Dataset {
    fn dataset_id(&self) -> Uuid {
        self.id
    }
}

impl AsDataset for HistoryDatasetAssociation {
    fn dataset_id(&self) -> Uuid {
        self.dataset_id
    }
}

impl AsDataset for LibraryDatasetAssociation {
    fn dataset_id(&self) -> Uuid {
        self.dataset_id
    }
}

impl<T: AsDataset + ?Sized> AsDataset for &T {
    fn dataset_id(&self) -> Uuid {
        (**self).dataset_id()
    }
}
