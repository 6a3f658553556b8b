// Object Store Gateway: stores binary attachments in a content bucket
// and hands back stable URLs. Everything above this module works in
// terms of URLs; the concrete backend (S3-compatible in production,
// in-memory in tests) stays behind the gateway trait.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object store backend error: {0}")]
    Backend(String),

    #[error("URL is not under the configured storage base: {0}")]
    ForeignUrl(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage misconfigured: {0}")]
    Config(String),
}

/// A file received from the client, ready for upload.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl IncomingFile {
    pub fn mimetype(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .to_string()
        })
    }
}

/// Reference to a stored object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub mimetype: String,
}

/// Gateway contract. `put` must not return a reference that failed to
/// store; `delete` is idempotent (a missing backing object is fine).
#[async_trait]
pub trait ObjectGateway: Send + Sync {
    async fn put(&self, file: &IncomingFile, folder: &str) -> Result<StoredObject, StorageError>;
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Cloneable gateway handle injected into the router as an extension.
#[derive(Clone)]
pub struct SharedGateway(pub Arc<dyn ObjectGateway>);

/// Gateway over an `object_store` backend. Keys are collision-resistant
/// (`folder/date/uuid-name`) and map 1:1 to URLs under the configured
/// public base.
pub struct RemoteStore {
    store: Arc<dyn ObjectStore>,
    base_url: String,
}

impl RemoteStore {
    pub fn new(store: Arc<dyn ObjectStore>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// S3-compatible backend configured from AWS_* environment variables
    /// plus the bucket from app config.
    pub fn s3_from_env() -> Result<Self, StorageError> {
        let storage = &crate::config::config().storage;
        let store = object_store::aws::AmazonS3Builder::from_env()
            .with_bucket_name(&storage.bucket)
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        Ok(Self::new(Arc::new(store), storage.public_base_url.clone()))
    }

    /// In-memory backend for tests and local development.
    pub fn in_memory(base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), base_url)
    }

    fn key_for(folder: &str, file_name: &str) -> String {
        let date = Utc::now().format("%Y/%m/%d");
        format!(
            "{}/{}/{}-{}",
            folder.trim_matches('/'),
            date,
            Uuid::new_v4(),
            sanitize_file_name(file_name)
        )
    }

    fn key_from_url(&self, url: &str) -> Result<ObjectPath, StorageError> {
        let prefix = format!("{}/", self.base_url);
        let key = url
            .strip_prefix(&prefix)
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        ObjectPath::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl ObjectGateway for RemoteStore {
    async fn put(&self, file: &IncomingFile, folder: &str) -> Result<StoredObject, StorageError> {
        let key = Self::key_for(folder, &file.file_name);
        let path =
            ObjectPath::parse(&key).map_err(|e| StorageError::InvalidKey(e.to_string()))?;

        self.store
            .put(&path, file.bytes.clone())
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!(key = %key, size = file.bytes.len(), "stored object");

        Ok(StoredObject {
            name: file.file_name.clone(),
            url: format!("{}/{}", self.base_url, key),
            size: file.bytes.len() as u64,
            mimetype: file.mimetype(),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.key_from_url(url)?;
        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            // Idempotent delete: the object being gone already is fine
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }
}

/// Keep filenames URL- and key-safe; anything outside a conservative
/// character set becomes a dash.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> IncomingFile {
        IncomingFile {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(b"\x89PNG fake"),
        }
    }

    #[tokio::test]
    async fn put_returns_url_under_base() {
        let gateway = RemoteStore::in_memory("https://cdn.test/bucket");
        let stored = gateway.put(&png("sports day.png"), "albums").await.unwrap();

        assert!(stored.url.starts_with("https://cdn.test/bucket/albums/"));
        assert!(stored.url.ends_with("sports-day.png"));
        assert_eq!(stored.size, 9);
        assert_eq!(stored.mimetype, "image/png");
        assert_eq!(stored.name, "sports day.png");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let gateway = RemoteStore::in_memory("https://cdn.test/bucket");
        let stored = gateway.put(&png("a.png"), "albums").await.unwrap();

        gateway.delete(&stored.url).await.unwrap();
        // Second delete of the same URL: not-found is swallowed
        gateway.delete(&stored.url).await.unwrap();
    }

    #[tokio::test]
    async fn delete_rejects_foreign_urls() {
        let gateway = RemoteStore::in_memory("https://cdn.test/bucket");
        let err = gateway.delete("https://elsewhere.example/key.png").await;
        assert!(matches!(err, Err(StorageError::ForeignUrl(_))));
    }

    #[test]
    fn keys_are_collision_resistant_and_foldered() {
        let a = RemoteStore::key_for("classwork", "notes.pdf");
        let b = RemoteStore::key_for("classwork", "notes.pdf");
        assert!(a.starts_with("classwork/"));
        assert!(a.ends_with("-notes.pdf"));
        assert_ne!(a, b);
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_file_name("résumé (final).pdf"), "r-sum---final-.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_file_name("???"), "file");
    }

    #[test]
    fn mimetype_falls_back_to_guess() {
        let file = IncomingFile {
            file_name: "report.pdf".to_string(),
            content_type: None,
            bytes: Bytes::new(),
        };
        assert_eq!(file.mimetype(), "application/pdf");
    }
}
