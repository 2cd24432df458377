//! Terminal output for the CLI.
//!
//! Progress and results go to stdout; warnings and errors go to stderr.
//! Logging through `log` is separate and controlled by `RUST_LOG`.

use std::io::{self, Write};

/// Verbose/quiet aware printer.
#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Only in verbose mode.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if self.is_verbose() {
            writeln!(io::stdout().lock(), "  {}", message)?;
        }
        Ok(())
    }

    pub fn progress(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(io::stdout().lock(), "→ {}", message)
    }

    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(io::stdout().lock(), "✓ {}", message)
    }

    pub fn warn(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(io::stderr().lock(), "⚠ {}", message)
    }

    /// Printed even when quiet.
    pub fn error(&self, message: &str) -> io::Result<()> {
        writeln!(io::stderr().lock(), "✗ {}", message)
    }

    /// Recovery hint under an error; printed even when quiet.
    pub fn hint(&self, message: &str) -> io::Result<()> {
        writeln!(io::stderr().lock(), "  → {}", message)
    }

    pub fn section(&self, title: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut out = io::stdout().lock();
        writeln!(out)?;
        writeln!(out, "{}", title)?;
        writeln!(out, "{}", "=".repeat(title.chars().count()))
    }

    pub fn indent(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(io::stdout().lock(), "  {}", message)
    }
}
