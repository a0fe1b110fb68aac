//! Cloudinary upload API client
//!
//! Requests are signed with SHA-256 over the sorted parameter string followed by
//! the API secret, so the account must have SHA-256 signatures enabled.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{MediaKind, ObjectStore, StorageError, StoredObject};
use crate::config::CloudinaryConfig;

const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    resource_type: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Clone)]
pub struct CloudinaryStore {
    http: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStore {
    pub fn new(config: &CloudinaryConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sign request parameters: `k1=v1&k2=v2` sorted by key, then the secret
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn rejected(response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        StorageError::Rejected { status, message }
    }
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        kind: MediaKind,
        file_name: &str,
    ) -> Result<StoredObject, StorageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let folder = kind.folder();
        let signature = self.sign(&[("folder", folder), ("timestamp", timestamp.as_str())]);

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder)
            .text("signature", signature);

        let response = self
            .http
            .post(format!("{}/{}/auto/upload", self.base_url, self.cloud_name))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        Ok(StoredObject {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
            resource_type: uploaded.resource_type,
        })
    }

    async fn delete(&self, object: &StoredObject) -> Result<(), StorageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", object.public_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        let response = self
            .http
            .post(format!(
                "{}/{}/{}/destroy",
                self.base_url, self.cloud_name, object.resource_type
            ))
            .form(&[
                ("public_id", object.public_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        let destroyed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(StorageError::InvalidResponse(other.to_string())),
        }
    }
}
