//! The artifact store capability.
//!
//! The job engine only needs two things from durable storage: put a local
//! file somewhere retrievable, and mint a time-limited URL for it later.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::client::R2Client;
use crate::error::{StorageError, StorageResult};

/// Validity of the URL returned alongside an upload.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Object key inside the bucket
    pub key: String,
    /// Signed URL valid for `UPLOAD_URL_TTL`
    pub signed_url: String,
}

/// Durable blob storage with signed-URL retrieval.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a local file under `namespace` and return its key plus a signed URL.
    async fn upload(&self, path: &Path, namespace: &str) -> StorageResult<StoredArtifact>;

    /// Mint a fresh signed URL for an existing key.
    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;
}

/// Build the object key for a local file: `<namespace>/<file name>`.
pub fn artifact_key(path: &Path, namespace: &str) -> StorageResult<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::invalid_key(format!("no file name in {}", path.display())))?;

    let namespace = namespace.trim_matches('/');
    if namespace.is_empty() {
        Ok(file_name.to_string())
    } else {
        Ok(format!("{}/{}", namespace, file_name))
    }
}

/// Content type from file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ArtifactStore for R2Client {
    async fn upload(&self, path: &Path, namespace: &str) -> StorageResult<StoredArtifact> {
        let key = artifact_key(path, namespace)?;
        self.upload_file(path, &key, content_type_for(path)).await?;

        let signed_url = self.presign_get(&key, UPLOAD_URL_TTL).await?;
        debug!(key = %key, "Minted upload URL");

        Ok(StoredArtifact { key, signed_url })
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.presign_get(key, ttl).await
    }
}
