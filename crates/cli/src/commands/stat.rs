//! stat command - Show object metadata
//!
//! Displays size, type, etag, date and user metadata of one object.

use clap::Args;
use r2up_core::{Error, FILE_HASH_KEY, ObjectInfo};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object key
    pub key: String,
}

#[derive(Debug, Serialize)]
struct StatOutput<'a> {
    #[serde(flatten)]
    info: &'a ObjectInfo,
    url: String,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let uploader = match ctx.connect(&formatter).await {
        Ok(uploader) => uploader,
        Err(code) => return code,
    };

    match uploader.stat(&args.key).await {
        Ok(info) => {
            let url = uploader.config().object_url(&info.key);
            if formatter.is_json() {
                formatter.json(&StatOutput { info: &info, url });
            } else {
                print_info(&formatter, &info, &url);
            }
            ExitCode::Success
        }
        Err(Error::ObjectNotFound(_)) => {
            formatter.error(&format!("Object not found: {}", args.key));
            ExitCode::NotFound
        }
        Err(e) => {
            formatter.error(&format!("Failed to get object metadata: {e}"));
            ExitCode::from_error(&e)
        }
    }
}

fn print_info(formatter: &Formatter, info: &ObjectInfo, url: &str) {
    formatter.println(&format!("Name      : {}", info.key));
    if let Some(modified) = info.last_modified {
        formatter.println(&format!(
            "Date      : {}",
            modified.strftime("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    formatter.println(&format!(
        "Size      : {} ({} bytes)",
        info.size_human, info.size_bytes
    ));
    if let Some(etag) = &info.etag {
        formatter.println(&format!("ETag      : {etag}"));
    }
    if let Some(ct) = &info.content_type {
        formatter.println(&format!("Type      : {ct}"));
    }
    if let Some(hash) = info.metadata.get(FILE_HASH_KEY) {
        formatter.println(&format!("MD5       : {hash}"));
    }

    let mut extra: Vec<_> = info
        .metadata
        .iter()
        .filter(|(k, _)| k.as_str() != FILE_HASH_KEY)
        .collect();
    extra.sort();
    for (key, value) in extra {
        formatter.println(&format!("Meta      : {key}={value}"));
    }
    formatter.println(&format!("URL       : {url}"));
}
