//! Error types for r2up-core
//!
//! One error type covers local preconditions, remote transfer failures,
//! catalog failures and configuration problems. Each variant maps to a CLI
//! exit code.

use thiserror::Error;

/// Result type alias for r2up-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for r2up-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid remote key or local path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Caller supplied an out-of-range argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Include/exclude pattern that does not compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Local file or directory does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Remote object already exists and overwriting was disallowed
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// Remote object does not exist
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Bucket probe returned 404
    #[error("Bucket '{0}' does not exist")]
    BucketNotFound(String),

    /// Bucket probe returned 403
    #[error("Access denied to bucket '{0}'")]
    AccessDenied(String),

    /// Store could not be reached or credentials are unusable
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Remote failure during put, part upload or finalization
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// A multipart session was aborted after a failure.
    ///
    /// `cause` is the failure that triggered the abort. If the abort itself
    /// failed, its message is carried in `abort_error`.
    #[error("Multipart upload {upload_id} aborted: {cause}{}", abort_suffix(.abort_error))]
    MultipartAborted {
        upload_id: String,
        cause: Box<Error>,
        abort_error: Option<String>,
    },

    /// Operation was cancelled before it finished
    #[error("Interrupted")]
    Interrupted,

    /// List, stat or presign failure
    #[error("Catalog operation failed: {0}")]
    Catalog(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// General error
    #[error("{0}")]
    General(String),
}

fn abort_suffix(abort_error: &Option<String>) -> String {
    match abort_error {
        Some(e) => format!(" (abort also failed: {e})"),
        None => String::new(),
    }
}

impl Error {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_)
            | Error::InvalidArgument(_)
            | Error::InvalidPattern { .. }
            | Error::Config(_)
            | Error::NotADirectory(_) => 2, // UsageError
            Error::Transfer(_) | Error::ConnectionFailed(_) | Error::Catalog(_) => 3, // NetworkError
            Error::AccessDenied(_) => 4, // AuthError
            Error::NotFound(_) | Error::ObjectNotFound(_) | Error::BucketNotFound(_) => 5, // NotFound
            Error::AlreadyExists(_) => 6, // Conflict
            Error::MultipartAborted { cause, .. } => cause.exit_code(),
            Error::Interrupted => 130, // Interrupted
            _ => 1, // GeneralError
        }
    }
}
