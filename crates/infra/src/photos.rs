//! Photo file storage.
//!
//! Records only hold references of the form `uploads/<name>`. Removing a file
//! is best effort: a missing file is skipped and any other failure is logged,
//! never returned.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("failed to store photo: {0}")]
    Io(#[from] io::Error),

    #[error("empty upload")]
    Empty,
}

#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Persist an upload under a fresh unique name and return its reference.
    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, PhotoError>;

    /// Remove a previously stored photo.
    async fn remove(&self, reference: &str);
}

/// Photos on the local filesystem, served back under `public_prefix`.
#[derive(Debug, Clone)]
pub struct LocalPhotoStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalPhotoStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_prefix: "uploads".to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference back to a file inside `root`, refusing anything that
    /// would escape it.
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let name = reference
            .strip_prefix(&self.public_prefix)?
            .strip_prefix('/')?;
        let file_name = Path::new(name).file_name()?;
        if file_name != name {
            return None;
        }
        Some(self.root.join(file_name))
    }
}

/// Lowercased alphanumeric extension of the client's file name, if any.
fn extension_of(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn unique_name(original_name: &str) -> String {
    let stem = format!(
        "{}-{}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::now_v7().simple()
    );
    match extension_of(original_name) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

#[async_trait]
impl PhotoStorage for LocalPhotoStorage {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, PhotoError> {
        if bytes.is_empty() {
            return Err(PhotoError::Empty);
        }
        tokio::fs::create_dir_all(&self.root).await?;
        let name = unique_name(original_name);
        tokio::fs::write(self.root.join(&name), bytes).await?;
        debug!(photo = %name, size = bytes.len(), "stored photo");
        Ok(format!("{}/{}", self.public_prefix, name))
    }

    async fn remove(&self, reference: &str) {
        let Some(path) = self.resolve(reference) else {
            warn!(reference, "refusing to remove photo outside upload directory");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(reference, "removed photo"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(reference, error = %e, "failed to remove photo"),
        }
    }
}
