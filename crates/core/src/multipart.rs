//! Multipart upload support
//!
//! Large files are split into fixed-size parts. Every session that is
//! created is either completed or aborted before the call returns.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::path::ObjectPath;
use crate::progress::{ProgressTracker, ProgressUnit, tracker_for};
use crate::result::{UploadResult, UploadType};
use crate::traits::{CompletedPart, ObjectStore};
use crate::upload::{UploadOptions, UploadTask, Uploader};

/// Default part size: 5 MiB
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Minimum part size: 5 MiB (S3 requirement for all but the last part)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: u64 = 10_000;

/// Per-call options for a multipart upload
#[derive(Debug, Clone, Default)]
pub struct MultipartOptions {
    /// Key, content type, metadata, overwrite and progress settings
    pub upload: UploadOptions,
    /// Part size in bytes; the uploader's configured size when unset
    pub part_size: Option<u64>,
}

impl MultipartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part_size(mut self, size: u64) -> Self {
        self.part_size = Some(size);
        self
    }
}

impl From<UploadOptions> for MultipartOptions {
    fn from(upload: UploadOptions) -> Self {
        Self {
            upload,
            part_size: None,
        }
    }
}

/// Pick the part size actually used for a file.
///
/// The requested size is clamped to the store limits and raised when the
/// file would otherwise need more than [`MAX_PARTS`] parts.
pub fn effective_part_size(requested: u64, file_size: u64) -> u64 {
    let part_size = requested.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
    if file_size.div_ceil(part_size) <= MAX_PARTS {
        part_size
    } else {
        file_size
            .div_ceil(MAX_PARTS)
            .clamp(MIN_PART_SIZE, MAX_PART_SIZE)
    }
}

/// Calculate number of parts for a file. An empty file still takes one part.
pub fn calculate_parts(file_size: u64, part_size: u64) -> u64 {
    file_size.div_ceil(part_size).max(1)
}

/// Get byte range `[start, end)` for a 1-based part
pub fn part_byte_range(part_number: i32, part_size: u64, total_size: u64) -> (u64, u64) {
    let start = (part_number as u64 - 1) * part_size;
    let end = (start + part_size).min(total_size);
    (start.min(total_size), end)
}

/// Lifecycle of a multipart session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Completed,
    Aborted,
}

/// One multipart upload in progress
#[derive(Debug)]
pub struct MultipartSession {
    upload_id: String,
    path: ObjectPath,
    parts: Vec<CompletedPart>,
    state: SessionState,
}

impl MultipartSession {
    pub fn new(upload_id: impl Into<String>, path: ObjectPath) -> Self {
        Self {
            upload_id: upload_id.into(),
            path,
            parts: Vec::new(),
            state: SessionState::Open,
        }
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Record a part acknowledged by the store
    pub fn record_part(&mut self, part_number: i32, etag: String) {
        self.parts.push(CompletedPart { part_number, etag });
    }

    /// Parts sorted by number, checked to be exactly `1..=expected`
    pub fn finalized_parts(&self, expected: u64) -> Result<Vec<CompletedPart>> {
        let mut parts = self.parts.clone();
        parts.sort_by_key(|p| p.part_number);

        let contiguous = parts
            .iter()
            .enumerate()
            .all(|(i, p)| p.part_number as u64 == i as u64 + 1);
        if parts.len() as u64 != expected || !contiguous {
            let numbers: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
            return Err(Error::Transfer(format!(
                "Upload {} has parts {numbers:?}, expected 1..={expected}",
                self.upload_id
            )));
        }
        Ok(parts)
    }

    /// Finalize the session. Only valid while open.
    pub async fn complete(&mut self, store: &dyn ObjectStore, expected: u64) -> Result<()> {
        if self.state != SessionState::Open {
            return Err(Error::General(format!(
                "Upload {} is already {:?}",
                self.upload_id, self.state
            )));
        }
        let parts = self.finalized_parts(expected)?;
        store
            .complete_multipart_upload(&self.path, &self.upload_id, &parts)
            .await?;
        self.state = SessionState::Completed;
        Ok(())
    }

    /// Abort the session. Issued at most once; a no-op unless open.
    pub async fn abort(&mut self, store: &dyn ObjectStore) -> Result<()> {
        if self.state != SessionState::Open {
            return Ok(());
        }
        self.state = SessionState::Aborted;
        store
            .abort_multipart_upload(&self.path, &self.upload_id)
            .await
    }
}

async fn read_part(path: &Path, start: u64, len: u64) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

impl Uploader {
    /// Upload a file as a multipart object.
    ///
    /// On any part or finalization failure, or on cancellation, the session
    /// is aborted and the original failure is returned inside
    /// [`Error::MultipartAborted`].
    pub async fn upload_multipart(
        &self,
        local: &Path,
        options: MultipartOptions,
    ) -> Result<UploadResult> {
        let task = self.prepare(local, &options.upload).await?;
        let requested = options.part_size.unwrap_or(self.config.transfer.part_size);
        let part_size = effective_part_size(requested, task.size);
        if part_size != requested {
            warn!(requested, part_size, "Part size adjusted to store limits");
        }
        let num_parts = calculate_parts(task.size, part_size);
        let path = self.object_path(&task.remote_key);

        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }
        let upload_id = self
            .store
            .create_multipart_upload(&path, &task.content_type, &task.metadata)
            .await?;
        info!(
            key = %task.remote_key,
            upload_id = %upload_id,
            parts = num_parts,
            part_size,
            "Multipart upload started"
        );
        let mut session = MultipartSession::new(upload_id, path.clone());

        let label = format!("Multipart {}", path.file_name());
        let tracker = tracker_for(
            self.progress.as_ref(),
            options.upload.show_progress,
            &label,
            task.size,
            ProgressUnit::Bytes,
        );

        let outcome = match self
            .upload_parts(&task, &mut session, part_size, num_parts, tracker.clone())
            .await
        {
            Ok(()) => session.complete(self.store.as_ref(), num_parts).await,
            Err(e) => Err(e),
        };
        tracker.finish();

        if let Err(cause) = outcome {
            let abort_error = match session.abort(self.store.as_ref()).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(upload_id = %session.upload_id(), error = %e, "Abort failed");
                    Some(e.to_string())
                }
            };
            error!(
                key = %task.remote_key,
                upload_id = %session.upload_id(),
                error = %cause,
                "Multipart upload failed"
            );
            return Err(Error::MultipartAborted {
                upload_id: session.upload_id().to_string(),
                cause: Box::new(cause),
                abort_error,
            });
        }
        info!(key = %task.remote_key, parts = num_parts, "Multipart upload completed");

        let info = match self.store.head_object(&path).await {
            Ok(info) => info,
            Err(e) => {
                warn!(key = %task.remote_key, error = %e, "Could not read back uploaded object");
                Self::local_info(&task)
            }
        };
        let url = self.config.object_url(&task.remote_key);
        Ok(UploadResult::succeeded(&task, info, url, UploadType::Multipart)
            .with_parts(num_parts, part_size))
    }

    /// Upload parts with at most `concurrency` in flight. Stops at the
    /// first failure or on cancellation; parts still in flight are dropped.
    async fn upload_parts(
        &self,
        task: &UploadTask,
        session: &mut MultipartSession,
        part_size: u64,
        num_parts: u64,
        tracker: Arc<dyn ProgressTracker>,
    ) -> Result<()> {
        let concurrency = self.config.transfer.concurrency.max(1);
        let store = self.store.as_ref();
        let path = session.path().clone();
        let upload_id = session.upload_id().to_string();
        let (path, upload_id) = (&path, upload_id.as_str());

        let mut uploads = futures::stream::iter(1..=num_parts as i32)
            .map(move |part_number| {
                let tracker = tracker.clone();
                async move {
                    let (start, end) = part_byte_range(part_number, part_size, task.size);
                    let data = read_part(&task.local_path, start, end - start).await?;
                    let len = data.len() as u64;
                    debug!(upload_id, part_number, bytes = len, "Uploading part");
                    let etag = store.upload_part(path, upload_id, part_number, data).await?;
                    tracker.advance(len);
                    Ok::<_, Error>((part_number, etag))
                }
            })
            .buffer_unordered(concurrency);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(upload_id, "Multipart upload cancelled");
                    return Err(Error::Interrupted);
                }
                next = uploads.next() => next,
            };
            match next {
                Some(result) => {
                    let (part_number, etag) = result?;
                    session.record_part(part_number, etag);
                }
                None => return Ok(()),
            }
        }
    }
}
