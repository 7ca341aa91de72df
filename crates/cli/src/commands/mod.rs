//! CLI command definitions and execution
//!
//! Each command lives in its own module with an `Args` struct and an
//! `execute` function returning an [`ExitCode`].

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use r2up_core::{Config, ConfigManager, Uploader, UploaderConfig};
use r2up_s3::S3Store;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, TransferProgress};

mod config;
mod ls;
mod rm;
mod share;
mod stat;
mod sync;
mod upload;

/// r2up - upload files to S3-compatible object storage
///
/// Uploads single files (single-shot or multipart) and directory trees to
/// Cloudflare R2 or any other S3-compatible store.
#[derive(Parser, Debug)]
#[command(name = "r2up")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Directory holding config.toml
    #[arg(long, global = true, env = "R2UP_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Store settings that override the config file
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Account ID
    #[arg(long, global = true, env = "R2_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Access key ID
    #[arg(long, global = true, env = "R2_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(long, global = true, env = "R2_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Bucket name
    #[arg(long, global = true, env = "R2_BUCKET")]
    pub bucket: Option<String>,

    /// Endpoint URL (defaults to https://{account_id}.r2.cloudflarestorage.com)
    #[arg(long, global = true, env = "R2_ENDPOINT")]
    pub endpoint: Option<String>,
}

impl StoreArgs {
    /// Overlay command-line and environment values onto a loaded config
    pub fn apply(&self, config: &mut Config) {
        let store = &mut config.store;
        if let Some(v) = &self.account_id {
            store.account_id = v.clone();
        }
        if let Some(v) = &self.access_key {
            store.access_key = v.clone();
        }
        if let Some(v) = &self.secret_key {
            store.secret_key = v.clone();
        }
        if let Some(v) = &self.bucket {
            store.bucket = v.clone();
        }
        if let Some(v) = &self.endpoint {
            store.endpoint = Some(v.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file
    Upload(upload::UploadArgs),

    /// Upload every matching file under a directory
    Sync(sync::SyncArgs),

    /// List objects
    Ls(ls::LsArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Remove objects
    Rm(rm::RmArgs),

    /// Generate a presigned download URL
    Share(share::ShareArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

/// Everything a command needs besides its own arguments
pub struct Context {
    pub config: Config,
    pub manager: ConfigManager,
    pub output: OutputConfig,
    /// Cancelled on Ctrl-C; running uploads clean up and stop
    pub cancel: CancellationToken,
}

impl Context {
    pub fn formatter(&self) -> Formatter {
        Formatter::new(self.output.clone())
    }

    /// Build the store client and connect an uploader to the bucket
    pub async fn connect(&self, formatter: &Formatter) -> Result<Uploader, ExitCode> {
        let store = match S3Store::from_config(&self.config).await {
            Ok(store) => store,
            Err(e) => {
                formatter.error(&format!("Failed to create S3 client: {e}"));
                return Err(ExitCode::from_error(&e));
            }
        };

        debug!(bucket = %self.config.store.bucket, "Connecting to bucket");
        match Uploader::connect(Arc::new(store), UploaderConfig::from_config(&self.config)).await {
            Ok(uploader) => Ok(uploader
                .with_progress(Arc::new(TransferProgress::new(self.output.clone())))
                .with_cancellation(self.cancel.clone())),
            Err(e) => {
                formatter.error(&format!(
                    "Cannot access bucket '{}': {e}",
                    self.config.store.bucket
                ));
                Err(ExitCode::from_error(&e))
            }
        }
    }
}

fn config_manager(config_dir: Option<PathBuf>) -> r2up_core::Result<ConfigManager> {
    match config_dir {
        Some(dir) => Ok(ConfigManager::with_path(dir.join("config.toml"))),
        None => ConfigManager::new(),
    }
}

/// Combine CLI flags with the `[defaults]` section of the config file
fn output_config(cli: &Cli, config: &Config) -> OutputConfig {
    let defaults = &config.defaults;
    OutputConfig {
        json: cli.json || defaults.output == "json",
        no_color: cli.no_color || defaults.color == "never",
        no_progress: cli.no_progress || !defaults.progress,
        quiet: cli.quiet,
    }
}

/// Execute the CLI command and return an exit code.
///
/// Cancelling `cancel` asks running transfers to stop; the returned future
/// still has to be awaited so open multipart sessions get aborted.
pub async fn execute(cli: Cli, cancel: CancellationToken) -> ExitCode {
    let flags_only = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    let loaded = config_manager(cli.config_dir.clone())
        .and_then(|manager| manager.load().map(|config| (manager, config)));
    let (manager, mut config) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            Formatter::new(flags_only).error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from_error(&e);
        }
    };
    debug!(path = %manager.config_path().display(), "Configuration loaded");
    cli.store.apply(&mut config);

    let ctx = Context {
        output: output_config(&cli, &config),
        config,
        manager,
        cancel,
    };

    match cli.command {
        Commands::Upload(args) => upload::execute(args, &ctx).await,
        Commands::Sync(args) => sync::execute(args, &ctx).await,
        Commands::Ls(args) => ls::execute(args, &ctx).await,
        Commands::Stat(args) => stat::execute(args, &ctx).await,
        Commands::Rm(args) => rm::execute(args, &ctx).await,
        Commands::Share(args) => share::execute(args, &ctx).await,
        Commands::Config(cmd) => config::execute(cmd, &ctx, &cli.store),
    }
}
