//! upload command - Upload one file
//!
//! Uses a single PUT by default, or a multipart session with `--multipart`.

use std::path::PathBuf;

use clap::Args;
use r2up_core::{MultipartOptions, UploadOptions};

use super::Context;
use crate::exit_code::ExitCode;

/// Upload a file
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local file to upload
    pub file: PathBuf,

    /// Remote key (defaults to the file name)
    pub key: Option<String>,

    /// Content type (guessed from the extension when omitted)
    #[arg(long)]
    pub content_type: Option<String>,

    /// Custom metadata as key=value, repeatable
    #[arg(long = "meta", value_parser = parse_key_val)]
    pub meta: Vec<(String, String)>,

    /// Fail if the object already exists
    #[arg(long)]
    pub no_overwrite: bool,

    /// Upload in parts
    #[arg(long)]
    pub multipart: bool,

    /// Part size in bytes for multipart uploads (implies --multipart)
    #[arg(long)]
    pub part_size: Option<u64>,
}

/// Parse a `key=value` pair
pub(crate) fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("invalid metadata '{s}', expected key=value")),
    }
}

/// Execute the upload command
pub async fn execute(args: UploadArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let uploader = match ctx.connect(&formatter).await {
        Ok(uploader) => uploader,
        Err(code) => return code,
    };

    let mut options = UploadOptions::new()
        .overwrite(!args.no_overwrite)
        .progress(ctx.output.progress_enabled());
    options.remote_key = args.key;
    options.content_type = args.content_type;
    options.metadata.extend(args.meta);

    let outcome = if args.multipart || args.part_size.is_some() {
        let options = MultipartOptions {
            upload: options,
            part_size: args.part_size,
        };
        uploader.upload_multipart(&args.file, options).await
    } else {
        uploader.upload_file(&args.file, options).await
    };

    match outcome {
        Ok(result) => {
            formatter.upload_result(&result);
            if result.success {
                ExitCode::Success
            } else {
                ExitCode::NetworkError
            }
        }
        Err(e) => {
            formatter.error(&format!("Upload of {} failed: {e}", args.file.display()));
            ExitCode::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("author=me").unwrap(),
            ("author".to_string(), "me".to_string())
        );
        assert_eq!(
            parse_key_val("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_key_val("empty=").unwrap().1, "");
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }
}
