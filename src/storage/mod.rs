//! Media storage
//!
//! Profile images live in an external object store. Uploads are irreversible
//! side effects from the database's point of view, so every caller that uploads
//! before persisting goes through [`coordinator::UploadCoordinator`] and records
//! what it created.

pub mod cloudinary;
pub mod coordinator;
pub mod memory;
pub mod staging;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cloudinary::CloudinaryStore;
pub use coordinator::{PendingUploads, UploadCoordinator};
pub use memory::InMemoryObjectStore;
pub use staging::{StagedFile, Staging};

/// Kind of media attached to a user profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Avatar,
    CoverImage,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Avatar => "avatar",
            MediaKind::CoverImage => "coverImage",
        }
    }

    /// Remote folder the object is filed under
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Avatar => "profilevault/avatars",
            MediaKind::CoverImage => "profilevault/covers",
        }
    }
}

/// Reference to an object that exists in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub public_id: String,
    pub url: String,
    pub resource_type: String,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Staged file unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media store request failed: {0}")]
    Request(String),

    #[error("Media store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected media store response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Request(e.to_string())
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bytes: Vec<u8>,
        kind: MediaKind,
        file_name: &str,
    ) -> Result<StoredObject, StorageError>;

    async fn delete(&self, object: &StoredObject) -> Result<(), StorageError>;
}
