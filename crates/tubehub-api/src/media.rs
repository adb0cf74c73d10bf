//! Media storage collaborator. Clients stage files out of band and send
//! their names; handlers resolve them inside the staging area and hand them
//! to a `MediaStore`, storing only the returned URL.

use std::path::{Component, Path, PathBuf};

use futures_util::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("staged file {0} does not exist")]
    Missing(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upload endpoint returned status {0}")]
    Status(u16),
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub url: String,
    pub duration_seconds: Option<f64>,
}

pub trait MediaStore: Send + Sync {
    /// Moves the staged file at `local_path` into storage.
    fn upload<'a>(&'a self, local_path: &'a Path) -> BoxFuture<'a, Result<StoredMedia, MediaError>>;
}

/// Resolves client-supplied staged file names. Only plain relative names
/// inside the staging root are accepted.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, field: &str, name: &str) -> Result<PathBuf, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::validation(field, "is required"));
        }
        let relative = Path::new(name);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(ApiError::validation(field, "must name a file in the staging area"));
        }
        Ok(self.root.join(relative))
    }
}

/// Keeps media on local disk under `root`, served at `base_url`.
pub struct DiskMediaStore {
    root: PathBuf,
    base_url: String,
}

impl DiskMediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    async fn store(&self, local_path: &Path) -> Result<StoredMedia, MediaError> {
        if tokio::fs::metadata(local_path).await.is_err() {
            return Err(MediaError::Missing(local_path.display().to_string()));
        }
        tokio::fs::create_dir_all(&self.root).await?;

        let mut name = Uuid::new_v4().to_string();
        if let Some(ext) = local_path.extension().and_then(|e| e.to_str()) {
            name.push('.');
            name.push_str(&ext.to_ascii_lowercase());
        }
        let dest = self.root.join(&name);

        // rename fails across filesystems; fall back to copy + remove
        if tokio::fs::rename(local_path, &dest).await.is_err() {
            tokio::fs::copy(local_path, &dest).await?;
            if let Err(e) = tokio::fs::remove_file(local_path).await {
                warn!("Failed to remove staged file {}: {}", local_path.display(), e);
            }
        }

        info!("Stored media {}", dest.display());
        Ok(StoredMedia {
            url: format!("{}/{}", self.base_url.trim_end_matches('/'), name),
            duration_seconds: None,
        })
    }
}

impl MediaStore for DiskMediaStore {
    fn upload<'a>(&'a self, local_path: &'a Path) -> BoxFuture<'a, Result<StoredMedia, MediaError>> {
        Box::pin(self.store(local_path))
    }
}

/// Posts staged bytes to a remote hosting endpoint which answers with
/// `{ "url": ..., "duration": ... }`.
pub struct HttpMediaStore {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct UploadReply {
    url: String,
    #[serde(default)]
    duration: Option<f64>,
}

impl HttpMediaStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    async fn send(&self, local_path: &Path) -> Result<StoredMedia, MediaError> {
        let bytes = match tokio::fs::read(local_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::Missing(local_path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(MediaError::Status(resp.status().as_u16()));
        }
        let reply: UploadReply = resp.json().await?;

        if let Err(e) = tokio::fs::remove_file(local_path).await {
            warn!("Failed to remove staged file {}: {}", local_path.display(), e);
        }

        Ok(StoredMedia {
            url: reply.url,
            duration_seconds: reply.duration,
        })
    }
}

impl MediaStore for HttpMediaStore {
    fn upload<'a>(&'a self, local_path: &'a Path) -> BoxFuture<'a, Result<StoredMedia, MediaError>> {
        Box::pin(self.send(local_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_rejects_escapes() {
        let staging = StagingArea::new("/srv/staging");
        assert_eq!(
            staging.resolve("avatar_file", "me.png").unwrap(),
            PathBuf::from("/srv/staging/me.png")
        );
        assert!(staging.resolve("avatar_file", "../etc/passwd").is_err());
        assert!(staging.resolve("avatar_file", "/etc/passwd").is_err());
        assert!(staging.resolve("avatar_file", "  ").is_err());
    }

    #[tokio::test]
    async fn disk_store_moves_the_staged_file() {
        let base = std::env::temp_dir().join(format!("tubehub-media-{}", Uuid::new_v4()));
        let staged = base.join("clip.MP4");
        tokio::fs::create_dir_all(&base).await.unwrap();
        tokio::fs::write(&staged, b"frames").await.unwrap();

        let store = DiskMediaStore::new(base.join("media"), "/media/");
        let stored = store.upload(&staged).await.unwrap();

        assert!(stored.url.starts_with("/media/"));
        assert!(stored.url.ends_with(".mp4"));
        assert!(tokio::fs::metadata(&staged).await.is_err());

        let missing = store.upload(&staged).await;
        assert!(matches!(missing, Err(MediaError::Missing(_))));

        tokio::fs::remove_dir_all(&base).await.unwrap();
    }
}
