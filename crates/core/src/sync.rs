//! Directory synchronization
//!
//! Walks a local tree and uploads every regular file that passes the
//! include/exclude filters, one file at a time.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::path::{join_key, relative_key};
use crate::progress::{ProgressUnit, tracker_for};
use crate::result::{BatchResult, UploadResult};
use crate::upload::{UploadOptions, Uploader};

/// Options for a directory upload
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Remote key prefix
    pub prefix: String,
    /// Files must match at least one of these, when non-empty
    pub include: Vec<String>,
    /// Files matching any of these are skipped
    pub exclude: Vec<String>,
    /// Count processed files on a batch progress tracker
    pub show_progress: bool,
    pub overwrite: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            show_progress: true,
            overwrite: true,
        }
    }
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One compiled glob, matched from the right end of a relative path
#[derive(Debug, Clone)]
struct PathPattern {
    pattern: Pattern,
    anchored: bool,
    segments: usize,
}

impl PathPattern {
    fn compile(raw: &str) -> Result<Self> {
        let anchored = raw.starts_with('/');
        let body = raw.trim_start_matches('/');
        let pattern = Pattern::new(body).map_err(|e| Error::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self {
            pattern,
            anchored,
            segments: body.split('/').count(),
        })
    }

    fn matches(&self, relative: &str) -> bool {
        if self.anchored {
            return self.pattern.matches_with(relative, MATCH_OPTIONS);
        }
        let parts: Vec<&str> = relative.split('/').collect();
        if parts.len() < self.segments {
            return false;
        }
        let tail = parts[parts.len() - self.segments..].join("/");
        self.pattern.matches_with(&tail, MATCH_OPTIONS)
    }
}

/// Include/exclude filter. Exclusion takes precedence.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<PathPattern>,
    exclude: Vec<PathPattern>,
}

impl PathFilter {
    /// Compile both pattern lists, failing on the first invalid pattern
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<PathPattern>> {
            patterns.iter().map(|p| PathPattern::compile(p)).collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Whether a forward-slash relative path should be uploaded
    pub fn accepts(&self, relative: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| p.matches(relative));
        included && !self.exclude.iter().any(|p| p.matches(relative))
    }
}

/// A file found during the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    /// Path relative to the walk root, with forward slashes
    pub relative: String,
}

/// List regular files under `root` in a deterministic order.
/// Symlinks are skipped, not followed.
pub fn walk_dir(root: &Path) -> Result<Vec<LocalFile>> {
    let mut files = Vec::new();
    walk_into(root, root, &mut files)?;
    Ok(files)
}

fn walk_into(root: &Path, dir: &Path, files: &mut Vec<LocalFile>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            walk_into(root, &path, files)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .map(relative_key)
                .map_err(|e| Error::General(e.to_string()))?;
            files.push(LocalFile { path, relative });
        } else {
            debug!(path = %path.display(), "Skipping non-regular file");
        }
    }
    Ok(())
}

impl Uploader {
    /// Upload every matching file under a directory.
    ///
    /// Per-file failures are collected in the batch result; the walk never
    /// stops early on them. `Err` is returned for a missing directory, an
    /// invalid pattern, an unreadable tree or cancellation.
    pub async fn upload_directory(&self, dir: &Path, options: SyncOptions) -> Result<BatchResult> {
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(Error::NotADirectory(dir.display().to_string())),
        }
        let filter = PathFilter::new(&options.include, &options.exclude)?;

        let root = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || walk_dir(&root))
            .await
            .map_err(|e| Error::General(format!("Directory walk failed: {e}")))??;
        let selected: Vec<LocalFile> = files
            .into_iter()
            .filter(|f| filter.accepts(&f.relative))
            .collect();
        info!(dir = %dir.display(), files = selected.len(), "Syncing directory");

        let label = format!("Syncing {}", dir.display());
        let tracker = tracker_for(
            self.progress.as_ref(),
            options.show_progress,
            &label,
            selected.len() as u64,
            ProgressUnit::Files,
        );

        let mut batch = BatchResult::default();
        for file in selected {
            if self.cancel.is_cancelled() {
                tracker.finish();
                warn!(processed = batch.total, "Directory sync interrupted");
                return Err(Error::Interrupted);
            }
            let key = join_key(&options.prefix, &file.relative);
            let upload_options = UploadOptions::new()
                .key(key.clone())
                .overwrite(options.overwrite)
                .progress(false);
            let result = match self.upload_file(&file.path, upload_options).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(file = %file.path.display(), error = %e, "Skipping file");
                    UploadResult::failed(&file.path, &key, e.to_string())
                }
            };
            batch.push(result);
            tracker.advance(1);
        }
        tracker.finish();

        info!(
            succeeded = batch.succeeded,
            failed = batch.failed,
            total = batch.total,
            "Directory sync finished"
        );
        Ok(batch)
    }
}
