//! Library subtree visibility.

use std::future::Future;
use std::pin::Pin;

use rbac_types::{Action, FolderEntry, User};
use tracing::debug;
use uuid::Uuid;

use crate::engine::RbacEngine;
use crate::error::RbacResult;
use crate::store::PermissionStore;

type FolderCheck<'a> = Pin<Box<dyn Future<Output = RbacResult<bool>> + 'a>>;

impl<S: PermissionStore> RbacEngine<S> {
    /// Whether the subject can access anything under `entry`.
    ///
    /// - `Library`: checks its root folder
    /// - `Folder`: true if any active dataset in the subtree is accessible
    /// - `Dataset`: a direct access check
    ///
    /// Folders check their own datasets before descending and stop at the
    /// first accessible dataset. Deleted entries are never visited.
    pub async fn check_folder_contents(
        &self,
        user: Option<&User>,
        entry: &FolderEntry,
    ) -> RbacResult<bool> {
        let user_id = user.map(|u| u.id);
        match entry {
            FolderEntry::Library(library) => self.check_folder(user_id, library.root_folder_id).await,
            FolderEntry::Folder(folder) => self.check_folder(user_id, folder.id).await,
            FolderEntry::Dataset(lda) => {
                self.is_allowed_for(user_id, Action::DatasetAccess, lda.dataset_id)
                    .await
            }
        }
    }

    fn check_folder(&self, user_id: Option<Uuid>, folder_id: Uuid) -> FolderCheck<'_> {
        Box::pin(async move {
            let contents = self.store.list_folder_contents(folder_id).await?;

            for lda in &contents.datasets {
                if self
                    .is_allowed_for(user_id, Action::DatasetAccess, lda.dataset_id)
                    .await?
                {
                    return Ok(true);
                }
            }

            for sub in &contents.folders {
                if self.check_folder(user_id, sub.id).await? {
                    return Ok(true);
                }
            }

            debug!(%folder_id, "No accessible dataset in folder");
            Ok(false)
        })
    }
}
