//! r2up-core: Upload engine for S3-compatible object storage
//!
//! This crate provides the core functionality for the r2up CLI, including:
//! - Content hashing and single-shot uploads
//! - Multipart uploads that never leave orphaned sessions
//! - Directory synchronization with include/exclude filters
//! - Listing, stat, deletion and presigned URLs
//! - Configuration management
//!
//! The engine talks to storage only through the [`ObjectStore`] trait, so it
//! is independent of any specific S3 SDK. [`MemoryStore`] implements the
//! trait in process for tests.

pub mod catalog;
pub mod config;
pub mod error;
pub mod hash;
pub mod memory;
pub mod multipart;
pub mod path;
pub mod progress;
pub mod result;
pub mod sync;
pub mod traits;
pub mod upload;

pub use catalog::{CatalogEntry, DEFAULT_MAX_KEYS, MAX_PRESIGN_EXPIRY_SECS};
pub use config::{Config, ConfigManager, RetryConfig, StoreConfig, TimeoutConfig, TransferConfig};
pub use error::{Error, Result};
pub use hash::{FILE_HASH_KEY, file_digest};
pub use memory::MemoryStore;
pub use multipart::{DEFAULT_PART_SIZE, MAX_PART_SIZE, MIN_PART_SIZE, MultipartOptions};
pub use path::ObjectPath;
pub use progress::{NoProgress, ProgressReporter, ProgressTracker, ProgressUnit};
pub use result::{BatchResult, UploadResult, UploadType};
pub use sync::{PathFilter, SyncOptions};
pub use traits::{CompletedPart, ObjectInfo, ObjectStore};
pub use upload::{UploadOptions, Uploader, UploaderConfig};
