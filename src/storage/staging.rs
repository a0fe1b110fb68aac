//! Local staging of incoming attachments
//!
//! Multipart file fields are streamed to disk before they are pushed to the
//! object store. A staged copy must be removed on every path, successful or not.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Open a new staged file; the on-disk name never reuses the client's file name
    pub async fn begin(&self, original_name: Option<&str>) -> io::Result<StagedWriter> {
        let file_name = original_name
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or("upload")
            .to_string();

        let extension = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let path = self
            .dir
            .join(format!("{}{}", Uuid::new_v4().simple(), extension));
        let file = fs::File::create(&path).await?;

        Ok(StagedWriter {
            file,
            staged: StagedFile { path, file_name },
        })
    }

    /// Stage an in-memory payload in one step
    pub async fn stage_bytes(&self, original_name: &str, bytes: &[u8]) -> io::Result<StagedFile> {
        let mut writer = self.begin(Some(original_name)).await?;
        if let Err(e) = writer.write(bytes).await {
            writer.abort().await;
            return Err(e);
        }
        writer.finish().await
    }
}

pub struct StagedWriter {
    file: fs::File,
    staged: StagedFile,
}

impl StagedWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await
    }

    pub async fn finish(mut self) -> io::Result<StagedFile> {
        if let Err(e) = self.file.flush().await {
            self.staged.discard().await;
            return Err(e);
        }
        Ok(self.staged)
    }

    pub async fn abort(self) {
        drop(self.file);
        self.staged.discard().await;
    }
}

/// Attachment held on local disk until it is uploaded or discarded
#[derive(Debug, Clone)]
pub struct StagedFile {
    path: PathBuf,
    file_name: String,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name supplied by the client
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path).await
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Remove the local copy; a file that is already gone is not an error
    pub async fn discard(&self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed staged file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged file")
            }
        }
    }
}
