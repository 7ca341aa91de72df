//! share command - Generate a presigned download URL

use clap::Args;
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;

/// Generate a presigned download URL
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Object key
    pub key: String,

    /// Lifetime of the URL in seconds (max 604800)
    #[arg(long, default_value_t = 3600, allow_negative_numbers = true)]
    pub expires: i64,
}

#[derive(Debug, Serialize)]
struct ShareOutput {
    key: String,
    url: String,
    expires_in_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,
}

/// Execute the share command
pub async fn execute(args: ShareArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let uploader = match ctx.connect(&formatter).await {
        Ok(uploader) => uploader,
        Err(code) => return code,
    };

    match uploader.presigned_url(&args.key, args.expires).await {
        Ok(url) => {
            let expires_at = Timestamp::now()
                .checked_add(SignedDuration::from_secs(args.expires))
                .ok();
            if formatter.is_json() {
                formatter.json(&ShareOutput {
                    key: args.key,
                    url,
                    expires_in_secs: args.expires,
                    expires_at,
                });
            } else {
                formatter.println(&url);
                if let Some(at) = expires_at {
                    formatter.println(&format!("Expires   : {}", at.strftime("%Y-%m-%d %H:%M:%S UTC")));
                }
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to share {}: {e}", args.key));
            ExitCode::from_error(&e)
        }
    }
}
