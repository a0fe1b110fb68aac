//! Upload coordination and compensation
//!
//! Objects created in the store are tracked as pending until the enclosing
//! workflow commits. If the workflow aborts, every pending object is deleted in
//! reverse creation order. Delete failures are logged and swallowed: the outcome
//! of a workflow is decided by its creation path, never by cleanup.

use std::sync::Arc;

use super::{MediaKind, ObjectStore, StagedFile, StorageError, StoredObject};

#[derive(Clone)]
pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Push a staged file to the store. The local copy is removed whatever the outcome.
    pub async fn upload(
        &self,
        staged: &StagedFile,
        kind: MediaKind,
    ) -> Result<StoredObject, StorageError> {
        let result = match staged.read().await {
            Ok(bytes) => self.store.put(bytes, kind, staged.file_name()).await,
            Err(e) => Err(StorageError::from(e)),
        };

        staged.discard().await;

        match &result {
            Ok(object) => tracing::info!(
                kind = kind.as_str(),
                public_id = %object.public_id,
                "Media uploaded"
            ),
            Err(e) => tracing::error!(kind = kind.as_str(), error = %e, "Media upload failed"),
        }

        result
    }

    /// Best-effort delete
    pub async fn remove(&self, object: &StoredObject) {
        match self.store.delete(object).await {
            Ok(()) => tracing::info!(public_id = %object.public_id, "Media deleted"),
            Err(e) => tracing::warn!(
                public_id = %object.public_id,
                error = %e,
                "Failed to delete media, object may be orphaned"
            ),
        }
    }

    /// Start tracking uploads for one workflow
    pub fn begin(&self) -> PendingUploads<'_> {
        PendingUploads {
            coordinator: self,
            objects: Vec::new(),
        }
    }
}

/// Uploads that have happened but are not yet backed by a committed record
#[must_use = "pending uploads must be committed or compensated"]
pub struct PendingUploads<'a> {
    coordinator: &'a UploadCoordinator,
    objects: Vec<StoredObject>,
}

impl PendingUploads<'_> {
    pub fn record(&mut self, object: StoredObject) {
        self.objects.push(object);
    }

    /// Delete everything recorded, newest first
    pub async fn compensate(self) {
        if self.objects.is_empty() {
            return;
        }

        tracing::warn!(count = self.objects.len(), "Compensating uploaded media");
        for object in self.objects.iter().rev() {
            self.coordinator.remove(object).await;
        }
    }

    /// The workflow committed; the uploads are now owned by the record
    pub fn commit(self) -> Vec<StoredObject> {
        self.objects
    }
}
