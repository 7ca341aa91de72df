//! Object paths and remote key derivation
//!
//! An [`ObjectPath`] names one object in one bucket. Keys use forward
//! slashes as pseudo-directory separators and never start with a slash.

use std::path::Path;

use crate::error::{Error, Result};

/// A bucket plus object key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    /// Bucket name
    pub bucket: String,
    /// Object key (empty for bucket root)
    pub key: String,
}

impl ObjectPath {
    /// Create a new ObjectPath
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Final key segment
    pub fn file_name(&self) -> &str {
        self.key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Join a key prefix and a relative key with exactly one slash between them
/// and no leading slash.
pub fn join_key(prefix: &str, relative: &str) -> String {
    let base = prefix.trim_matches('/');
    let child = relative.trim_start_matches('/');
    if base.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{child}")
    }
}

/// Render a relative local path as a forward-slash key fragment
pub fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Default remote key for a local file: its base name
pub fn default_key(local: &Path) -> Result<String> {
    local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::InvalidPath(format!(
                "Cannot derive an object key from '{}'",
                local.display()
            ))
        })
}

/// Validate a caller-supplied key
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidPath("Object key cannot be empty".into()));
    }
    if key.len() > 1024 {
        return Err(Error::InvalidPath(format!(
            "Object key is {} bytes long, the limit is 1024",
            key.len()
        )));
    }
    Ok(())
}

/// Public URL of an object: `https://{bucket}.{account_id}.{storage_domain}/{key}`
pub fn object_url(bucket: &str, account_id: &str, storage_domain: &str, key: &str) -> String {
    format!("https://{bucket}.{account_id}.{storage_domain}/{key}")
}
