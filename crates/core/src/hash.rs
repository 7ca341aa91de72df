//! Streaming content digest
//!
//! Files are hashed in fixed-size chunks so memory use stays flat no matter
//! how large the file is.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Metadata key carrying the hex MD5 of the uploaded content
pub const FILE_HASH_KEY: &str = "file-hash";

/// Read buffer size used while hashing
const HASH_CHUNK_SIZE: usize = 256 * 1024;

/// Compute the MD5 hex digest of a local file.
pub async fn file_digest(path: &Path) -> Result<String> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_digest_sync(&path))
        .await
        .map_err(|e| Error::General(format!("Hashing task failed: {e}")))?
}

/// Synchronous MD5 computation.
pub fn file_digest_sync(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// MD5 hex digest of an in-memory buffer
pub fn bytes_digest(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}
