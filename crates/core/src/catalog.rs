//! Catalog operations: list, stat, delete and share

use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::traits::ObjectInfo;
use crate::upload::Uploader;

/// Default and maximum number of keys returned by one listing
pub const DEFAULT_MAX_KEYS: i32 = 1000;

/// Longest presigned URL lifetime accepted by SigV4: 7 days
pub const MAX_PRESIGN_EXPIRY_SECS: i64 = 604_800;

/// One listed object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    pub size_bytes: i64,
    pub size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub url: String,
}

fn catalog_error(operation: &str, key: &str, e: Error) -> Error {
    Error::Catalog(format!("{operation} '{key}': {e}"))
}

impl Uploader {
    /// List objects under a prefix, in store order.
    ///
    /// `max_keys` must be within `1..=1000`.
    pub async fn list_files(&self, prefix: &str, max_keys: i32) -> Result<Vec<CatalogEntry>> {
        if !(1..=DEFAULT_MAX_KEYS).contains(&max_keys) {
            return Err(Error::InvalidArgument(format!(
                "max keys must be between 1 and {DEFAULT_MAX_KEYS}, got {max_keys}"
            )));
        }
        let objects = self
            .store
            .list_objects(&self.config.bucket, prefix, max_keys)
            .await
            .map_err(|e| catalog_error("list", prefix, e))?;

        Ok(objects
            .into_iter()
            .map(|o| CatalogEntry {
                url: self.config.object_url(&o.key),
                key: o.key,
                size_bytes: o.size_bytes,
                size_human: o.size_human,
                last_modified: o.last_modified,
                etag: o.etag,
            })
            .collect())
    }

    /// Fetch an object's attributes and metadata
    pub async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        match self.store.head_object(&self.object_path(key)).await {
            Ok(info) => Ok(info),
            Err(e @ Error::ObjectNotFound(_)) => Err(e),
            Err(e) => Err(catalog_error("stat", key, e)),
        }
    }

    /// Delete an object. Returns whether the store accepted the request.
    pub async fn delete_file(&self, key: &str) -> bool {
        match self.store.delete_object(&self.object_path(key)).await {
            Ok(()) => {
                info!(key, "Object deleted");
                true
            }
            Err(e) => {
                error!(key, error = %e, "Delete failed");
                false
            }
        }
    }

    /// Signed GET URL valid for `expires_secs` seconds
    pub async fn presigned_url(&self, key: &str, expires_secs: i64) -> Result<String> {
        if expires_secs <= 0 || expires_secs > MAX_PRESIGN_EXPIRY_SECS {
            return Err(Error::InvalidArgument(format!(
                "expiry must be between 1 and {MAX_PRESIGN_EXPIRY_SECS} seconds, got {expires_secs}"
            )));
        }
        let expires = Duration::from_secs(expires_secs as u64);
        self.store
            .presigned_url(&self.object_path(key), expires)
            .await
            .map_err(|e| catalog_error("presign", key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{FILE_HASH_KEY, bytes_digest};
    use crate::memory::{MemoryStore, StoreCall};
    use crate::upload::{UploadOptions, UploaderConfig};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn uploader(store: Arc<MemoryStore>) -> Uploader {
        Uploader::connect(store, UploaderConfig::new("media", "acc"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_maps_entries_with_urls() {
        let store = MemoryStore::shared("media");
        store.insert("media", "img/a.png", b"aaaa");
        store.insert("media", "img/b.png", b"bb");
        store.insert("media", "doc/c.pdf", b"c");
        let uploader = uploader(store).await;

        let entries = uploader.list_files("img/", DEFAULT_MAX_KEYS).await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["img/a.png", "img/b.png"]);
        assert_eq!(entries[0].size_bytes, 4);
        assert_eq!(entries[0].url, "https://media.acc.r2.cloudflarestorage.com/img/a.png");

        let entries = uploader.list_files("", 1).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_list_validates_max_keys_and_wraps_failures() {
        let store = MemoryStore::shared("media");
        let uploader = uploader(store.clone()).await;
        assert!(matches!(
            uploader.list_files("", 0).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            uploader.list_files("", 1001).await,
            Err(Error::InvalidArgument(_))
        ));

        store.fail_list();
        assert!(matches!(
            uploader.list_files("", 10).await,
            Err(Error::Catalog(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_then_stat_and_list_share_digest() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"frames").unwrap();
        let uploader = uploader(MemoryStore::shared("media")).await;

        uploader.upload_file(&file, UploadOptions::new()).await.unwrap();

        let info = uploader.stat("clip.mp4").await.unwrap();
        assert_eq!(info.metadata[FILE_HASH_KEY], bytes_digest(b"frames"));
        let entries = uploader.list_files("clip", DEFAULT_MAX_KEYS).await.unwrap();
        assert_eq!(entries[0].etag, info.etag);

        assert!(matches!(
            uploader.stat("nope").await,
            Err(Error::ObjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_reports_outcome() {
        let store = MemoryStore::shared("media");
        store.insert("media", "a", b"1");
        let uploader = uploader(store.clone()).await;

        assert!(uploader.delete_file("a").await);
        assert!(store.keys("media").is_empty());

        store.fail_delete();
        assert!(!uploader.delete_file("a").await);
    }

    #[tokio::test]
    async fn test_presign_rejects_bad_expiry_before_store_call() {
        let store = MemoryStore::shared("media");
        let uploader = uploader(store.clone()).await;

        for expiry in [0, -5, MAX_PRESIGN_EXPIRY_SECS + 1] {
            assert!(matches!(
                uploader.presigned_url("a", expiry).await,
                Err(Error::InvalidArgument(_))
            ));
        }
        assert_eq!(
            store.count_calls(|c| matches!(c, StoreCall::PresignedUrl(_))),
            0
        );

        let url = uploader.presigned_url("a", 3600).await.unwrap();
        assert!(url.contains("X-Amz-Expires=3600"));

        store.fail_presign();
        assert!(matches!(
            uploader.presigned_url("a", 60).await,
            Err(Error::Catalog(_))
        ));
    }
}
