//! sync command - Upload a directory tree
//!
//! Walks the directory, filters by include/exclude globs and uploads each
//! file under the given prefix. One failed file does not stop the rest.

use std::path::PathBuf;

use clap::Args;
use r2up_core::SyncOptions;

use super::Context;
use crate::exit_code::ExitCode;

/// Upload every matching file under a directory
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Local directory
    pub dir: PathBuf,

    /// Remote key prefix
    #[arg(default_value = "")]
    pub prefix: String,

    /// Only upload files matching this glob (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip files matching this glob (repeatable, wins over --include)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Fail files whose key already exists instead of replacing them
    #[arg(long)]
    pub no_overwrite: bool,
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let uploader = match ctx.connect(&formatter).await {
        Ok(uploader) => uploader,
        Err(code) => return code,
    };

    let options = SyncOptions {
        prefix: args.prefix,
        include: args.include,
        exclude: args.exclude,
        show_progress: ctx.output.progress_enabled(),
        overwrite: !args.no_overwrite,
    };

    match uploader.upload_directory(&args.dir, options).await {
        Ok(batch) => {
            formatter.batch_result(&batch);
            if batch.all_succeeded() {
                ExitCode::Success
            } else {
                ExitCode::GeneralError
            }
        }
        Err(e) => {
            formatter.error(&format!("Sync of {} failed: {e}", args.dir.display()));
            ExitCode::from_error(&e)
        }
    }
}
