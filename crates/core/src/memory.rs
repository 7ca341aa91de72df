//! In-memory object store
//!
//! Implements [`ObjectStore`] entirely in process. It enforces the same
//! multipart rules as S3 (contiguous part numbers, minimum part size, known
//! completion tokens), records every call, and can be told to fail specific
//! operations. Used by the test suites.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::hash::bytes_digest;
use crate::multipart::MIN_PART_SIZE;
use crate::path::ObjectPath;
use crate::progress::ProgressTracker;
use crate::traits::{CompletedPart, ObjectInfo, ObjectStore};

/// Progress granularity for simulated single-shot transfers
const PUT_PROGRESS_CHUNK: usize = 64 * 1024;

/// A store operation, as recorded in the call log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    HeadBucket(String),
    HeadObject(String),
    PutObject(String),
    CreateMultipartUpload(String),
    UploadPart { upload_id: String, part_number: i32, size: usize },
    CompleteMultipartUpload { upload_id: String, part_numbers: Vec<i32> },
    AbortMultipartUpload(String),
    ListObjects(String),
    DeleteObject(String),
    PresignedUrl(String),
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    metadata: HashMap<String, String>,
    etag: String,
    last_modified: jiff::Timestamp,
}

#[derive(Debug)]
struct PendingUpload {
    path: ObjectPath,
    content_type: String,
    metadata: HashMap<String, String>,
    parts: BTreeMap<i32, (String, Vec<u8>)>,
}

#[derive(Debug, Default)]
struct Failures {
    parts: HashSet<i32>,
    puts: HashSet<String>,
    complete: bool,
    abort: bool,
    list: bool,
    delete: bool,
    presign: bool,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashSet<String>,
    denied: HashSet<String>,
    objects: BTreeMap<(String, String), StoredObject>,
    uploads: HashMap<String, PendingUpload>,
    failures: Failures,
    part_latency: Option<Duration>,
    calls: Vec<StoreCall>,
}

/// In-process S3-like store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    next_upload: AtomicU64,
}

impl MemoryStore {
    /// Create a store containing one empty bucket
    pub fn new(bucket: impl Into<String>) -> Self {
        let store = Self::default();
        store.lock().buckets.insert(bucket.into());
        store
    }

    /// Wrap in an `Arc` for handing to an uploader
    pub fn shared(bucket: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(bucket))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the log from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make a bucket answer 403 to probes
    pub fn deny_bucket(&self, bucket: impl Into<String>) {
        let bucket = bucket.into();
        let mut state = self.lock();
        state.buckets.insert(bucket.clone());
        state.denied.insert(bucket);
    }

    /// Fail every upload of the given part number
    pub fn fail_part(&self, part_number: i32) {
        self.lock().failures.parts.insert(part_number);
    }

    /// Fail single-shot puts to the given key
    pub fn fail_put(&self, key: impl Into<String>) {
        self.lock().failures.puts.insert(key.into());
    }

    /// Delay every part upload, leaving time to cancel mid-transfer
    pub fn set_part_latency(&self, latency: Duration) {
        self.lock().part_latency = Some(latency);
    }

    /// Fail multipart finalization
    pub fn fail_complete(&self) {
        self.lock().failures.complete = true;
    }

    /// Fail multipart aborts
    pub fn fail_abort(&self) {
        self.lock().failures.abort = true;
    }

    /// Fail listings
    pub fn fail_list(&self) {
        self.lock().failures.list = true;
    }

    /// Fail deletions
    pub fn fail_delete(&self) {
        self.lock().failures.delete = true;
    }

    /// Fail presigning
    pub fn fail_presign(&self) {
        self.lock().failures.presign = true;
    }

    /// Insert an object directly, bypassing the call log
    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        let object = StoredObject {
            data: data.to_vec(),
            content_type: "application/octet-stream".to_string(),
            metadata: HashMap::new(),
            etag: bytes_digest(data),
            last_modified: jiff::Timestamp::now(),
        };
        self.lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), object);
    }

    /// Stored bytes of an object
    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    /// Keys stored in a bucket, in lexicographic order
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Multipart sessions that were neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls matching a predicate
    pub fn count_calls(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn info(key: &str, object: &StoredObject) -> ObjectInfo {
        let mut info = ObjectInfo::file(key, object.data.len() as i64);
        info.etag = Some(object.etag.clone());
        info.content_type = Some(object.content_type.clone());
        info.metadata = object.metadata.clone();
        info.last_modified = Some(object.last_modified);
        info
    }

    fn require_bucket(state: &State, bucket: &str) -> Result<()> {
        if state.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(Error::Transfer(format!("NoSuchBucket: {bucket}")))
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::HeadBucket(bucket.to_string()));
        if state.denied.contains(bucket) {
            Err(Error::AccessDenied(bucket.to_string()))
        } else if state.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(Error::BucketNotFound(bucket.to_string()))
        }
    }

    async fn head_object(&self, path: &ObjectPath) -> Result<ObjectInfo> {
        let mut state = self.lock();
        state.calls.push(StoreCall::HeadObject(path.key.clone()));
        state
            .objects
            .get(&(path.bucket.clone(), path.key.clone()))
            .map(|o| Self::info(&path.key, o))
            .ok_or_else(|| Error::ObjectNotFound(path.to_string()))
    }

    async fn put_object(
        &self,
        path: &ObjectPath,
        data: Vec<u8>,
        content_type: &str,
        metadata: &HashMap<String, String>,
        progress: Arc<dyn ProgressTracker>,
    ) -> Result<ObjectInfo> {
        let object = {
            let mut state = self.lock();
            state.calls.push(StoreCall::PutObject(path.key.clone()));
            Self::require_bucket(&state, &path.bucket)?;
            if state.failures.puts.contains(&path.key) {
                return Err(Error::Transfer(format!("InternalError: put {path}")));
            }
            let object = StoredObject {
                etag: bytes_digest(&data),
                data,
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
                last_modified: jiff::Timestamp::now(),
            };
            state
                .objects
                .insert((path.bucket.clone(), path.key.clone()), object.clone());
            object
        };

        for chunk in object.data.chunks(PUT_PROGRESS_CHUNK) {
            progress.advance(chunk.len() as u64);
        }
        Ok(Self::info(&path.key, &object))
    }

    async fn create_multipart_upload(
        &self,
        path: &ObjectPath,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<String> {
        let mut state = self.lock();
        state
            .calls
            .push(StoreCall::CreateMultipartUpload(path.key.clone()));
        Self::require_bucket(&state, &path.bucket)?;
        let upload_id = format!("upload-{}", self.next_upload.fetch_add(1, Ordering::SeqCst) + 1);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                path: path.clone(),
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _path: &ObjectPath,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String> {
        let latency = {
            let mut state = self.lock();
            state.calls.push(StoreCall::UploadPart {
                upload_id: upload_id.to_string(),
                part_number,
                size: data.len(),
            });
            state.part_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if state.failures.parts.contains(&part_number) {
            return Err(Error::Transfer(format!(
                "InternalError: part {part_number} of {upload_id}"
            )));
        }
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| Error::Transfer(format!("NoSuchUpload: {upload_id}")))?;
        let etag = bytes_digest(&data);
        upload.parts.insert(part_number, (etag.clone(), data));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        _path: &ObjectPath,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::CompleteMultipartUpload {
            upload_id: upload_id.to_string(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });
        if state.failures.complete {
            return Err(Error::Transfer(format!("InternalError: complete {upload_id}")));
        }
        let upload = state
            .uploads
            .get(upload_id)
            .ok_or_else(|| Error::Transfer(format!("NoSuchUpload: {upload_id}")))?;

        if parts.is_empty() {
            return Err(Error::Transfer("MalformedXML: no parts".into()));
        }
        let mut data = Vec::new();
        let mut part_digests = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if part.part_number != index as i32 + 1 {
                return Err(Error::Transfer(format!(
                    "InvalidPartOrder: expected part {}, got {}",
                    index + 1,
                    part.part_number
                )));
            }
            let (etag, bytes) = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| Error::Transfer(format!("InvalidPart: {}", part.part_number)))?;
            if *etag != part.etag {
                return Err(Error::Transfer(format!("InvalidPart: etag of {}", part.part_number)));
            }
            let is_last = index + 1 == parts.len();
            if !is_last && (bytes.len() as u64) < MIN_PART_SIZE {
                return Err(Error::Transfer(format!(
                    "EntityTooSmall: part {} is {} bytes",
                    part.part_number,
                    bytes.len()
                )));
            }
            data.extend_from_slice(bytes);
            part_digests.push(md5::compute(bytes).0);
        }

        let combined = md5::compute(part_digests.concat());
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| Error::Transfer(format!("NoSuchUpload: {upload_id}")))?;
        let object = StoredObject {
            data,
            content_type: upload.content_type,
            metadata: upload.metadata,
            etag: format!("{combined:x}-{}", parts.len()),
            last_modified: jiff::Timestamp::now(),
        };
        state
            .objects
            .insert((upload.path.bucket, upload.path.key), object);
        Ok(())
    }

    async fn abort_multipart_upload(&self, _path: &ObjectPath, upload_id: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(StoreCall::AbortMultipartUpload(upload_id.to_string()));
        if state.failures.abort {
            return Err(Error::Transfer(format!("InternalError: abort {upload_id}")));
        }
        state
            .uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| Error::Transfer(format!("NoSuchUpload: {upload_id}")))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> Result<Vec<ObjectInfo>> {
        let mut state = self.lock();
        state.calls.push(StoreCall::ListObjects(prefix.to_string()));
        if state.failures.list {
            return Err(Error::Transfer(format!("InternalError: list {prefix}")));
        }
        Self::require_bucket(&state, bucket)?;
        Ok(state
            .objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .take(max_keys.max(0) as usize)
            .map(|((_, k), o)| Self::info(k, o))
            .collect())
    }

    async fn delete_object(&self, path: &ObjectPath) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::DeleteObject(path.key.clone()));
        if state.failures.delete {
            return Err(Error::Transfer(format!("InternalError: delete {path}")));
        }
        // S3 reports success for missing keys as well.
        state
            .objects
            .remove(&(path.bucket.clone(), path.key.clone()));
        Ok(())
    }

    async fn presigned_url(&self, path: &ObjectPath, expires: Duration) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(StoreCall::PresignedUrl(path.key.clone()));
        if state.failures.presign {
            return Err(Error::Transfer(format!("SignatureDoesNotMatch: {path}")));
        }
        Ok(format!(
            "https://{}.memory.invalid/{}?X-Amz-Expires={}",
            path.bucket,
            path.key,
            expires.as_secs()
        ))
    }
}
