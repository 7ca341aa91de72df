//! config command - Manage the configuration file
//!
//! `init` writes the effective settings (file values overlaid with flags and
//! environment) to config.toml. `show` prints them with secrets masked.

use anyhow::{Context as _, bail};
use clap::{Args, Subcommand};
use r2up_core::Config;

use super::{Context, StoreArgs};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a configuration file from the given settings
    Init(InitArgs),

    /// Print the effective configuration
    Show,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Replace an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Execute a config subcommand
pub fn execute(cmd: ConfigCommands, ctx: &Context, store: &StoreArgs) -> ExitCode {
    let formatter = ctx.formatter();
    match cmd {
        ConfigCommands::Init(args) => match init(ctx, store, args.force, &formatter) {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                formatter.error(&format!("{e:#}"));
                if ctx.manager.config_path().exists() && !args.force {
                    ExitCode::Conflict
                } else {
                    ExitCode::GeneralError
                }
            }
        },
        ConfigCommands::Show => match show(ctx, &formatter) {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                formatter.error(&format!("{e:#}"));
                ExitCode::GeneralError
            }
        },
    }
}

fn init(ctx: &Context, store: &StoreArgs, force: bool, formatter: &Formatter) -> anyhow::Result<()> {
    let path = ctx.manager.config_path();
    if path.exists() && !force {
        bail!(
            "{} already exists, use --force to replace it",
            path.display()
        );
    }
    if store.secret_key.is_some() {
        formatter.warning("The secret key will be stored in plain text");
    }
    if let Err(e) = ctx.config.store.validate() {
        formatter.warning(&format!("Configuration is incomplete: {e}"));
    }

    ctx.manager
        .save(&ctx.config)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    formatter.success(&format!("Configuration written to {}", path.display()));
    Ok(())
}

fn show(ctx: &Context, formatter: &Formatter) -> anyhow::Result<()> {
    let masked = masked(&ctx.config);
    if formatter.is_json() {
        formatter.json(&masked);
    } else {
        let text = toml::to_string_pretty(&masked).context("Failed to render configuration")?;
        formatter.println(&format!("# {}", ctx.manager.config_path().display()));
        formatter.println(text.trim_end());
    }
    Ok(())
}

/// Copy of the config with credentials hidden
fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    config.store.access_key = mask(&config.store.access_key);
    config.store.secret_key = mask(&config.store.secret_key);
    config
}

fn mask(secret: &str) -> String {
    match secret.chars().count() {
        0 => String::new(),
        n if n <= 8 => "*".repeat(n),
        n => {
            let head: String = secret.chars().take(4).collect();
            format!("{head}{}", "*".repeat(n - 4))
        }
    }
}
