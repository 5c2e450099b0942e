//! Publishes a downloaded scratch file to the remote store.
//!
//! # Design
//! - The destination folder is resolved once per process. Concurrent first
//!   callers share one lookup; a failed lookup leaves the cache empty so the
//!   next transfer retries.
//! - Each remote step maps to its own [`PublishStep`] so aborts name the step.

use std::path::Path;
use std::sync::Arc;

use ferry_core::{
    CollaboratorError, CollaboratorResult, PublishStep, RemoteFolder, StorageProvider,
    TransferError,
};
use tokio::sync::OnceCell;
use tracing::info;

/// Process-wide memo of the destination folder.
#[derive(Debug)]
pub struct ContainerCache {
    name: String,
    cell: OnceCell<RemoteFolder>,
}

impl ContainerCache {
    /// Cache for the folder called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell: OnceCell::new(),
        }
    }

    /// Resolved folder, if a lookup already succeeded.
    #[must_use]
    pub fn cached(&self) -> Option<&RemoteFolder> {
        self.cell.get()
    }

    /// Find the folder by name, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns the storage error when the lookup or creation fails.
    pub async fn resolve(&self, storage: &dyn StorageProvider) -> CollaboratorResult<RemoteFolder> {
        self.cell
            .get_or_try_init(|| async {
                if let Some(found) = storage.find_folder(&self.name).await? {
                    info!(folder_id = %found.id, name = %self.name, "using existing folder");
                    return Ok(found);
                }
                let created = storage.create_folder(&self.name).await?;
                info!(folder_id = %created.id, name = %self.name, "created folder");
                Ok(created)
            })
            .await
            .cloned()
    }
}

/// Uploads files and makes them publicly readable.
pub struct RemotePublisher {
    storage: Arc<dyn StorageProvider>,
    container: ContainerCache,
}

impl RemotePublisher {
    /// Publisher writing into the folder called `folder_name`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageProvider>, folder_name: impl Into<String>) -> Self {
        Self {
            storage,
            container: ContainerCache::new(folder_name),
        }
    }

    /// Folder cache shared by every publication.
    #[must_use]
    pub const fn container(&self) -> &ContainerCache {
        &self.container
    }

    /// Upload `local` as `display_name` and return its canonical public URL.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::PublishFailed`] naming the step that failed.
    pub async fn publish(&self, local: &Path, display_name: &str) -> Result<String, TransferError> {
        let storage = self.storage.as_ref();
        let folder = self
            .container
            .resolve(storage)
            .await
            .map_err(|source| failed(PublishStep::ResolveContainer, source))?;
        let session = storage
            .create_object(&folder, display_name)
            .await
            .map_err(|source| failed(PublishStep::CreateObject, source))?;
        let object = storage
            .upload_content(&session, local)
            .await
            .map_err(|source| failed(PublishStep::UploadContent, source))?;
        storage
            .grant_public_read(&object)
            .await
            .map_err(|source| failed(PublishStep::GrantPublicRead, source))?;
        info!(object_id = %object.id, folder_id = %folder.id, "object published");
        Ok(object.canonical_url())
    }
}

const fn failed(step: PublishStep, source: CollaboratorError) -> TransferError {
    TransferError::PublishFailed { step, source }
}
