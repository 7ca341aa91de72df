//! ObjectStore trait definition
//!
//! This trait is the capability interface the upload engine needs from an
//! S3-compatible store. It keeps the engine independent of any SDK, so the
//! same code runs against `r2up-s3` in production and against
//! [`MemoryStore`](crate::memory::MemoryStore) or a mock in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::ObjectPath;
use crate::progress::ProgressTracker;

/// Attributes of a stored object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,

    /// Size in bytes
    pub size_bytes: i64,

    /// Human-readable size
    pub size_human: String,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag (MD5 for single-part uploads, `{md5}-{parts}` for multipart)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// User metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for an object of the given size
    pub fn file(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes: size,
            size_human: humansize::format_size(size.max(0) as u64, humansize::BINARY),
            last_modified: None,
            etag: None,
            content_type: None,
            metadata: HashMap::new(),
        }
    }
}

/// A part acknowledged by the store during a multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// 1-based part number
    pub part_number: i32,
    /// Completion token returned by the store
    pub etag: String,
}

/// Trait for S3-compatible storage operations
///
/// Implementations map their native errors onto [`Error`](crate::Error):
/// a missing object is `ObjectNotFound`, bucket probe failures are
/// `BucketNotFound`, `AccessDenied` or `ConnectionFailed`, and every other
/// remote failure is `Transfer`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check that a bucket exists and is accessible
    async fn head_bucket(&self, bucket: &str) -> Result<()>;

    /// Get object attributes
    async fn head_object(&self, path: &ObjectPath) -> Result<ObjectInfo>;

    /// Upload an object in a single request
    async fn put_object(
        &self,
        path: &ObjectPath,
        data: Vec<u8>,
        content_type: &str,
        metadata: &HashMap<String, String>,
        progress: Arc<dyn ProgressTracker>,
    ) -> Result<ObjectInfo>;

    /// Start a multipart upload session, returning its upload id
    async fn create_multipart_upload(
        &self,
        path: &ObjectPath,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String>;

    /// Upload one part, returning its completion token
    async fn upload_part(
        &self,
        path: &ObjectPath,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String>;

    /// Assemble the object from the uploaded parts
    async fn complete_multipart_upload(
        &self,
        path: &ObjectPath,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()>;

    /// Discard a multipart session and its uploaded parts
    async fn abort_multipart_upload(&self, path: &ObjectPath, upload_id: &str) -> Result<()>;

    /// List objects under a prefix
    async fn list_objects(&self, bucket: &str, prefix: &str, max_keys: i32)
    -> Result<Vec<ObjectInfo>>;

    /// Delete an object
    async fn delete_object(&self, path: &ObjectPath) -> Result<()>;

    /// Generate a presigned GET URL
    async fn presigned_url(&self, path: &ObjectPath, expires: Duration) -> Result<String>;
}
