//! Command line interface for the HeartMuLa Studio release pipeline.
//!
//! This module maps subcommands onto pipeline stages, builds the immutable
//! settings once, and turns a [`ReleaseError`] into a stage-named message,
//! recovery hints and an exit code.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RuntimeConfig};
pub use output::OutputManager;

use crate::bundler::{ReleasePipeline, SettingsBuilder, SigningIdentity, resolve_identity};
use crate::error::{CliError, ReleaseError, Result};

/// Main CLI entry point. Returns the process exit code.
pub async fn run(args: Args) -> i32 {
    let config = RuntimeConfig::from(&args);

    match execute(&args, &config).await {
        Ok(()) => 0,
        Err(e) => {
            report_error(&config, &e);
            e.exit_code()
        }
    }
}

async fn execute(args: &Args, config: &RuntimeConfig) -> Result<()> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let identity = if args.command.signs() {
        resolve_identity(args.identity.as_deref())
    } else {
        args.identity
            .as_deref()
            .map(SigningIdentity::parse)
            .unwrap_or_else(SigningIdentity::ad_hoc)
    };

    let settings = SettingsBuilder::new()
        .project_root(&args.project_root)
        .config_file(args.config.clone())
        .signing_identity(identity)
        .build()?;
    let pipeline = ReleasePipeline::new(settings);

    // `release` takes the lock itself.
    let _lock = match args.command {
        Command::ValidateOnly | Command::Release => None,
        _ => Some(pipeline.lock()?),
    };

    match args.command {
        Command::ValidateOnly => commands::validate_only(&pipeline, config),
        Command::BuildIcon => commands::build_icon(&pipeline, config).await,
        Command::Bundle => commands::bundle(&pipeline, config).await,
        Command::Sign => commands::sign(&pipeline, config),
        Command::Package => commands::package(&pipeline, config).await,
        Command::Release => commands::release(&pipeline, config).await,
        Command::SmokeTest => commands::smoke_test(&pipeline, config).await,
    }
}

fn report_error(config: &RuntimeConfig, error: &ReleaseError) {
    let headline = match error.stage() {
        Some(stage) => format!("{} stage failed: {}", stage, error),
        None => format!("Error: {}", error),
    };
    // Nothing useful can be done if stderr itself is gone.
    let _ = config.error(&headline);
    for suggestion in error.recovery_suggestions() {
        let _ = config.hint(&suggestion);
    }
}
