//! Upload outcomes
//!
//! Results are plain data handed back to the caller; the engine keeps no
//! reference to them once returned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::hash::FILE_HASH_KEY;
use crate::traits::ObjectInfo;
use crate::upload::UploadTask;

/// How an object was transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadType {
    Single,
    Multipart,
}

/// Outcome of uploading one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    pub local_path: PathBuf,
    pub remote_key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_type: Option<UploadType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts_count: Option<u64>,

    /// Part size actually used, after clamping to the store limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    /// A failed upload
    pub fn failed(local_path: &Path, remote_key: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            local_path: local_path.to_path_buf(),
            remote_key: remote_key.to_string(),
            file_size: None,
            content_type: None,
            etag: None,
            last_modified: None,
            metadata: HashMap::new(),
            url: None,
            upload_type: None,
            parts_count: None,
            part_size: None,
            error: Some(error.into()),
        }
    }

    /// A successful upload, filled from the server-confirmed attributes
    pub(crate) fn succeeded(
        task: &UploadTask,
        info: ObjectInfo,
        url: String,
        upload_type: UploadType,
    ) -> Self {
        Self {
            success: true,
            local_path: task.local_path.clone(),
            remote_key: task.remote_key.clone(),
            file_size: Some(info.size_bytes.max(0) as u64),
            content_type: Some(info.content_type.unwrap_or_else(|| task.content_type.clone())),
            etag: info.etag,
            last_modified: info.last_modified,
            metadata: info.metadata,
            url: Some(url),
            upload_type: Some(upload_type),
            parts_count: None,
            part_size: None,
            error: None,
        }
    }

    pub(crate) fn with_parts(mut self, parts: u64, part_size: u64) -> Self {
        self.parts_count = Some(parts);
        self.part_size = Some(part_size);
        self
    }

    /// Content digest recorded in the object's metadata
    pub fn digest(&self) -> Option<&str> {
        self.metadata.get(FILE_HASH_KEY).map(String::as_str)
    }
}

/// Aggregate outcome of a directory upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
    pub files: Vec<UploadResult>,
}

impl BatchResult {
    /// Record one file's outcome
    pub fn push(&mut self, result: UploadResult) {
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.total += 1;
        self.files.push(result);
    }

    /// Results that failed, in processing order
    pub fn failures(&self) -> impl Iterator<Item = &UploadResult> {
        self.files.iter().filter(|r| !r.success)
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
