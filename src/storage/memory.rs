//! In-process object store
//!
//! Stands in for Cloudinary in development and tests. Failures can be injected
//! per media kind and for deletes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{MediaKind, ObjectStore, StorageError, StoredObject};

#[derive(Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    deleted: Vec<String>,
    failing_kinds: HashSet<MediaKind>,
    fail_deletes: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reject every upload of `kind`
    pub fn fail_uploads_for(&self, kind: MediaKind) {
        self.state().failing_kinds.insert(kind);
    }

    /// Reject every delete
    pub fn fail_deletes(&self) {
        self.state().fail_deletes = true;
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.state().objects.contains_key(public_id)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.state().objects.values().any(|o| o.url == url)
    }

    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().objects.is_empty()
    }

    /// Public ids passed to successful deletes, in call order
    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        kind: MediaKind,
        file_name: &str,
    ) -> Result<StoredObject, StorageError> {
        let mut state = self.state();

        if state.failing_kinds.contains(&kind) {
            return Err(StorageError::Rejected {
                status: 503,
                message: format!("{} uploads unavailable", kind.as_str()),
            });
        }
        if bytes.is_empty() {
            return Err(StorageError::Rejected {
                status: 400,
                message: "Empty file".to_string(),
            });
        }

        let public_id = format!("{}/{}", kind.folder(), Uuid::new_v4().simple());
        let object = StoredObject {
            url: format!("memory://{}/{}", public_id, file_name),
            public_id: public_id.clone(),
            resource_type: "image".to_string(),
        };
        state.objects.insert(public_id, object.clone());

        Ok(object)
    }

    async fn delete(&self, object: &StoredObject) -> Result<(), StorageError> {
        let mut state = self.state();

        if state.fail_deletes {
            return Err(StorageError::Request("delete unavailable".to_string()));
        }

        state.objects.remove(&object.public_id);
        state.deleted.push(object.public_id.clone());
        Ok(())
    }
}
