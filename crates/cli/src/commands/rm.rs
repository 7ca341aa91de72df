//! rm command - Remove objects
//!
//! Removes one or more objects from the bucket. Every key is attempted even
//! when an earlier one fails.

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Remove objects
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object key(s) to remove
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Only show what would be deleted (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<String>,
    total: usize,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    if args.dry_run {
        for key in &args.keys {
            formatter.println(&format!("Would remove: {key}"));
        }
        return ExitCode::Success;
    }

    let uploader = match ctx.connect(&formatter).await {
        Ok(uploader) => uploader,
        Err(code) => return code,
    };

    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    for key in args.keys {
        if uploader.delete_file(&key).await {
            deleted.push(key);
        } else {
            formatter.error(&format!("Failed to remove {key}"));
            failed.push(key);
        }
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            status: if failed.is_empty() { "success" } else { "partial" },
            total: deleted.len(),
            deleted,
            failed: failed.clone(),
        });
    } else if !deleted.is_empty() {
        formatter.success(&format!("Removed {} object(s).", deleted.len()));
    }

    if failed.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}
