//! r2up - upload files to S3-compatible object storage
//!
//! A command-line interface for uploading files and directory trees to
//! Cloudflare R2 and other S3-compatible backends.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod exit_code;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --debug wins over RUST_LOG
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cancel = CancellationToken::new();
    let run = commands::execute(cli, cancel.clone());
    tokio::pin!(run);

    // On Ctrl-C, let the command abort open multipart sessions before exit
    let exit_code = tokio::select! {
        code = &mut run => code,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cleaning up");
            cancel.cancel();
            run.await;
            exit_code::ExitCode::Interrupted
        }
    };

    std::process::exit(exit_code.as_i32());
}
