//! Single-shot uploads
//!
//! [`Uploader`] owns one store connection and one bucket. Every other
//! operation (multipart, directory sync, catalog) hangs off the same type.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{Config, DEFAULT_STORAGE_DOMAIN, TransferConfig};
use crate::error::{Error, Result};
use crate::hash::{FILE_HASH_KEY, file_digest};
use crate::path::{ObjectPath, default_key, object_url, validate_key};
use crate::progress::{NoProgress, ProgressReporter, ProgressUnit, tracker_for};
use crate::result::{UploadResult, UploadType};
use crate::traits::{ObjectInfo, ObjectStore};

/// Fallback content type for unknown extensions
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Settings scoped to one uploader instance
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Target bucket
    pub bucket: String,
    /// Account identifier used in public URLs
    pub account_id: String,
    /// Domain used in public URLs
    pub storage_domain: String,
    /// Part size, concurrency and progress threshold
    pub transfer: TransferConfig,
}

impl UploaderConfig {
    pub fn new(bucket: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            account_id: account_id.into(),
            storage_domain: DEFAULT_STORAGE_DOMAIN.to_string(),
            transfer: TransferConfig::default(),
        }
    }

    /// Build from a loaded configuration file
    pub fn from_config(config: &Config) -> Self {
        Self {
            bucket: config.store.bucket.clone(),
            account_id: config.store.account_id.clone(),
            storage_domain: config.store.storage_domain.clone(),
            transfer: config.transfer.clone(),
        }
    }

    pub fn transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    /// Public URL of a key in this bucket
    pub fn object_url(&self, key: &str) -> String {
        object_url(&self.bucket, &self.account_id, &self.storage_domain, key)
    }
}

/// Per-call options for a single-shot upload
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Remote key; defaults to the file's base name
    pub remote_key: Option<String>,
    /// Content type; guessed from the extension when unset
    pub content_type: Option<String>,
    /// User metadata. The `file-hash` entry is always replaced.
    pub metadata: HashMap<String, String>,
    /// When false, an existing object at the key blocks the upload
    pub overwrite: bool,
    /// Report byte progress for files above the progress threshold
    pub show_progress: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            remote_key: None,
            content_type: None,
            metadata: HashMap::new(),
            overwrite: true,
            show_progress: true,
        }
    }
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.remote_key = Some(key.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Everything resolved about one file right before it is transferred
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub digest: String,
    pub size: u64,
}

/// Guess a content type from the file extension
pub fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Upload client bound to one store and one bucket
pub struct Uploader {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) config: UploaderConfig,
    pub(crate) progress: Arc<dyn ProgressReporter>,
    pub(crate) cancel: CancellationToken,
}

impl Uploader {
    /// Create an uploader after checking that the bucket is reachable.
    ///
    /// Fails with `BucketNotFound`, `AccessDenied` or `ConnectionFailed`.
    pub async fn connect(store: Arc<dyn ObjectStore>, config: UploaderConfig) -> Result<Self> {
        match store.head_bucket(&config.bucket).await {
            Ok(()) => {}
            Err(e @ (Error::BucketNotFound(_) | Error::AccessDenied(_) | Error::ConnectionFailed(_))) => {
                return Err(e);
            }
            Err(e) => return Err(Error::ConnectionFailed(e.to_string())),
        }
        info!(bucket = %config.bucket, "Connected to bucket");

        Ok(Self {
            store,
            config,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        })
    }

    /// Report progress through the given reporter
    pub fn with_progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = reporter;
        self
    }

    /// Stop work when the token is cancelled.
    ///
    /// An open multipart session is aborted before the call returns
    /// `Interrupted`. A single-shot request already in flight is allowed to
    /// finish.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    pub(crate) fn object_path(&self, key: &str) -> ObjectPath {
        ObjectPath::new(&self.config.bucket, key)
    }

    /// Upload one file in a single request.
    ///
    /// Remote failures come back as `Ok` with `success == false`. `Err` is
    /// reserved for local preconditions: a missing file, an existing object
    /// when `overwrite` is off, or a file that cannot be read.
    pub async fn upload_file(&self, local: &Path, options: UploadOptions) -> Result<UploadResult> {
        let task = self.prepare(local, &options).await?;
        let path = self.object_path(&task.remote_key);
        let data = tokio::fs::read(&task.local_path).await?;

        let show = options.show_progress && task.size > self.config.transfer.progress_threshold;
        let label = format!("Uploading {}", path.file_name());
        let tracker = tracker_for(
            self.progress.as_ref(),
            show,
            &label,
            task.size,
            ProgressUnit::Bytes,
        );

        let outcome = async {
            self.store
                .put_object(&path, data, &task.content_type, &task.metadata, tracker.clone())
                .await?;
            self.store.head_object(&path).await
        }
        .await;
        tracker.finish();

        match outcome {
            Ok(info) => {
                info!(key = %task.remote_key, size = task.size, "File uploaded");
                let url = self.config.object_url(&task.remote_key);
                Ok(UploadResult::succeeded(&task, info, url, UploadType::Single))
            }
            Err(e) => {
                let message = format!("Failed to upload file: {e}");
                error!(key = %task.remote_key, error = %e, "Upload failed");
                Ok(UploadResult::failed(local, &task.remote_key, message))
            }
        }
    }

    /// Validate the local file, resolve the key and content type, check
    /// for an existing object if required, and hash the content.
    pub(crate) async fn prepare(&self, local: &Path, options: &UploadOptions) -> Result<UploadTask> {
        let meta = match tokio::fs::metadata(local).await {
            Ok(meta) if meta.is_file() => meta,
            _ => return Err(Error::NotFound(local.display().to_string())),
        };

        let remote_key = match &options.remote_key {
            Some(key) => key.clone(),
            None => default_key(local)?,
        };
        validate_key(&remote_key)?;

        if !options.overwrite {
            self.ensure_absent(&remote_key).await?;
        }

        let content_type = options
            .content_type
            .clone()
            .unwrap_or_else(|| guess_content_type(local));

        let digest = file_digest(local).await?;
        let mut metadata = options.metadata.clone();
        metadata.insert(FILE_HASH_KEY.to_string(), digest.clone());

        Ok(UploadTask {
            local_path: local.to_path_buf(),
            remote_key,
            content_type,
            metadata,
            digest,
            size: meta.len(),
        })
    }

    async fn ensure_absent(&self, key: &str) -> Result<()> {
        match self.store.head_object(&self.object_path(key)).await {
            Ok(_) => Err(Error::AlreadyExists(key.to_string())),
            Err(Error::ObjectNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Attributes to report when the post-transfer probe is unavailable
    pub(crate) fn local_info(task: &UploadTask) -> ObjectInfo {
        let mut info = ObjectInfo::file(&task.remote_key, task.size as i64);
        info.content_type = Some(task.content_type.clone());
        info.metadata = task.metadata.clone();
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::bytes_digest;
    use crate::memory::{MemoryStore, StoreCall};
    use crate::progress::testing::RecordingReporter;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    async fn uploader(store: Arc<MemoryStore>) -> Uploader {
        Uploader::connect(store, UploaderConfig::new("media", "acc123"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_reports_bucket_problems() {
        let store = MemoryStore::shared("media");
        store.deny_bucket("private");

        let err = Uploader::connect(store.clone(), UploaderConfig::new("missing", "acc"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::BucketNotFound(_)));

        let err = Uploader::connect(store, UploaderConfig::new("private", "acc"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_upload_file_success() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "notes.txt", b"hello world");
        let store = MemoryStore::shared("media");
        let uploader = uploader(store.clone()).await;

        let result = uploader
            .upload_file(&file, UploadOptions::new().key("docs/notes.txt").metadata("author", "me"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.remote_key, "docs/notes.txt");
        assert_eq!(result.file_size, Some(11));
        assert_eq!(result.content_type.as_deref(), Some("text/plain"));
        assert_eq!(result.digest(), Some("5eb63bbbe01eeed093cb22bb8f5acdc3"));
        assert_eq!(result.metadata["author"], "me");
        assert_eq!(result.etag.as_deref(), Some("5eb63bbbe01eeed093cb22bb8f5acdc3"));
        assert!(result.last_modified.is_some());
        assert_eq!(
            result.url.as_deref(),
            Some("https://media.acc123.r2.cloudflarestorage.com/docs/notes.txt")
        );
        assert_eq!(result.upload_type, Some(UploadType::Single));
        assert_eq!(store.object_data("media", "docs/notes.txt").unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_default_key_and_content_type() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "blob.unknownext", b"x");
        let uploader = uploader(MemoryStore::shared("media")).await;

        let result = uploader.upload_file(&file, UploadOptions::new()).await.unwrap();
        assert_eq!(result.remote_key, "blob.unknownext");
        assert_eq!(result.content_type.as_deref(), Some(DEFAULT_CONTENT_TYPE));

        let result = uploader
            .upload_file(&file, UploadOptions::new().key("k").content_type("video/mp4"))
            .await
            .unwrap();
        assert_eq!(result.content_type.as_deref(), Some("video/mp4"));
    }

    #[tokio::test]
    async fn test_caller_cannot_override_file_hash() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "a.bin", b"abc");
        let uploader = uploader(MemoryStore::shared("media")).await;

        let result = uploader
            .upload_file(&file, UploadOptions::new().metadata(FILE_HASH_KEY, "bogus"))
            .await
            .unwrap();
        assert_eq!(result.digest(), Some(bytes_digest(b"abc").as_str()));
    }

    #[tokio::test]
    async fn test_missing_file_is_precondition_error() {
        let uploader = uploader(MemoryStore::shared("media")).await;
        let err = uploader
            .upload_file(Path::new("/no/such/file.txt"), UploadOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        let uploader = uploader(MemoryStore::shared("media")).await;
        let err = uploader
            .upload_file(dir.path(), UploadOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_no_overwrite_blocks_existing_object() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "a.txt", b"new");
        let store = MemoryStore::shared("media");
        store.insert("media", "a.txt", b"old");
        let uploader = uploader(store.clone()).await;

        let err = uploader
            .upload_file(&file, UploadOptions::new().overwrite(false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(ref k) if k == "a.txt"));
        assert_eq!(store.object_data("media", "a.txt").unwrap(), b"old");
        assert_eq!(store.count_calls(|c| matches!(c, StoreCall::PutObject(_))), 0);

        let result = uploader
            .upload_file(&file, UploadOptions::new().key("b.txt").overwrite(false))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_existing_object() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "a.txt", b"new");
        let store = MemoryStore::shared("media");
        store.insert("media", "a.txt", b"old");
        let uploader = uploader(store.clone()).await;

        let result = uploader.upload_file(&file, UploadOptions::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(store.object_data("media", "a.txt").unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_remote_failure_becomes_failed_result() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "a.txt", b"data");
        let store = MemoryStore::shared("media");
        store.fail_put("a.txt");
        let uploader = uploader(store).await;

        let result = uploader.upload_file(&file, UploadOptions::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.remote_key, "a.txt");
        assert!(result.error.unwrap().contains("Failed to upload file"));
        assert!(result.url.is_none());
    }

    #[tokio::test]
    async fn test_progress_for_large_file_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let data = vec![7u8; 2 * 1024 * 1024 + 100];
        let file = write_file(&dir, "big.bin", &data);
        let reporter = Arc::new(RecordingReporter::default());
        let uploader = uploader(MemoryStore::shared("media"))
            .await
            .with_progress(reporter.clone());

        let result = uploader.upload_file(&file, UploadOptions::new()).await.unwrap();
        assert!(result.success);

        let positions = reporter.positions();
        assert!(positions.len() > 1);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*positions.last().unwrap(), data.len() as u64);
        assert!(*reporter.tracker.finished.lock().unwrap());
    }

    #[tokio::test]
    async fn test_no_progress_for_small_file_or_when_disabled() {
        let dir = TempDir::new().unwrap();
        let small = write_file(&dir, "small.bin", &[1u8; 1024]);
        let big = write_file(&dir, "big.bin", &vec![1u8; 2 * 1024 * 1024]);
        let reporter = Arc::new(RecordingReporter::default());
        let uploader = uploader(MemoryStore::shared("media"))
            .await
            .with_progress(reporter.clone());

        uploader.upload_file(&small, UploadOptions::new()).await.unwrap();
        uploader
            .upload_file(&big, UploadOptions::new().progress(false))
            .await
            .unwrap();
        assert!(reporter.started.lock().unwrap().is_empty());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.mp4")), "video/mp4");
        assert_eq!(guess_content_type(Path::new("a.json")), "application/json");
        assert_eq!(guess_content_type(Path::new("noext")), DEFAULT_CONTENT_TYPE);
    }
}
