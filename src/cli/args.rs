//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap, with the signing
//! identity read from the environment when the flag is absent.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Release pipeline for HeartMuLa Studio
#[derive(Parser, Debug)]
#[command(
    name = "heartmula_release",
    version,
    about = "Validate, bundle, sign and package HeartMuLa Studio for macOS",
    long_about = "Builds the HeartMuLa Studio macOS release.

Stages run in order and each one gates the next:
  validate-only -> build-icon -> bundle -> sign -> package

Usage:
  heartmula_release validate-only
  heartmula_release release --identity \"Developer ID Application: Example (ABCDE12345)\"
  CODESIGN_IDENTITY=- heartmula_release sign

Exit code 0 from `release` guarantees a verified, signed disk image in dist/."
)]
pub struct Args {
    /// Project root containing launcher.py, backend/ and frontend/
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub project_root: PathBuf,

    /// Release configuration file, relative to the project root
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Signing identity: `ad-hoc` (or `-`) or a certificate name/fingerprint
    #[arg(long, global = true, env = "CODESIGN_IDENTITY", value_name = "IDENTITY")]
    pub identity: Option<String>,

    /// Show per-rule and per-target detail
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline entry points.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Check every release input and print the report
    ValidateOnly,
    /// Rasterize the vector icon and assemble the .icns
    BuildIcon,
    /// Freeze the launcher and write the .app
    Bundle,
    /// Sign the existing .app inside-out and verify it
    Sign,
    /// Re-verify the signed .app and build the disk image
    Package,
    /// Run every stage in order
    Release,
    /// Launch the built .app and wait for its health endpoint
    SmokeTest,
}

impl Command {
    /// Whether this command may change files and needs the run lock.
    pub fn mutates(&self) -> bool {
        !matches!(self, Command::ValidateOnly)
    }

    /// Whether this command signs and should announce the identity.
    pub fn signs(&self) -> bool {
        matches!(self, Command::Sign | Command::Release)
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if !self.project_root.is_dir() {
            return Err(format!(
                "project root {} is not a directory",
                self.project_root.display()
            ));
        }

        if let Some(config) = &self.config
            && config.is_absolute()
        {
            return Err(format!(
                "--config must be relative to the project root, got {}",
                config.display()
            ));
        }

        Ok(())
    }

    /// Default log filter for this invocation; `RUST_LOG` still wins.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print error message, even in quiet mode
    pub fn error(&self, message: &str) -> std::io::Result<()> {
        self.output.error(message)
    }

    /// Print a recovery hint under an error
    pub fn hint(&self, message: &str) -> std::io::Result<()> {
        self.output.hint(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }
}
