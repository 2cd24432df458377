//! External tool detection and availability checking.
//!
//! Probes run once per process; results are cached to avoid repeated
//! subprocess calls while the pipeline runs.

use crate::bundler::error::{Error, Result};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Vector-native rasterizer (librsvg).
pub static RSVG_CONVERT: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| probe("rsvg-convert", "--version"));

/// ImageMagick 7 (`magick`) or 6 (`convert`).
pub static IMAGEMAGICK: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| probe("magick", "-version").or_else(|| probe("convert", "-version")));

/// Python freezer used to build the onedir tree.
pub static PYINSTALLER: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| probe("pyinstaller", "--version"));

/// Locate `tool` on PATH and confirm it runs.
///
/// Returns `None` when the tool is missing or its version check fails.
pub fn probe(tool: &str, version_arg: &str) -> Option<PathBuf> {
    match which::which(tool) {
        Ok(path) => {
            log::debug!("Found {} at: {}", tool, path.display());

            match std::process::Command::new(&path).arg(version_arg).output() {
                Ok(output) if output.status.success() => {
                    let version = String::from_utf8_lossy(&output.stdout);
                    log::info!(
                        "✓ {} available: {}",
                        tool,
                        version.lines().next().unwrap_or("").trim()
                    );
                    Some(path)
                }
                Ok(output) => {
                    log::warn!(
                        "{} found at {} but {} check failed (exit code: {:?}). Stderr: {}",
                        tool,
                        path.display(),
                        version_arg,
                        output.status.code(),
                        String::from_utf8_lossy(&output.stderr)
                    );
                    None
                }
                Err(e) => {
                    log::warn!(
                        "{} found at {} but failed to execute: {}. Check file permissions.",
                        tool,
                        path.display(),
                        e
                    );
                    None
                }
            }
        }
        Err(e) => {
            log::debug!("{} not found in PATH: {}", tool, e);
            None
        }
    }
}

/// Locate a tool the pipeline cannot run without.
pub fn require(tool: &str, install_hint: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|_| Error::ToolFailed {
        tool: tool.to_string(),
        reason: format!("not found in PATH; {}", install_hint),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_probes_as_none() {
        assert_eq!(probe("heartmula-no-such-tool", "--version"), None);
    }

    #[test]
    fn require_names_the_tool_and_hint() {
        let err = require("heartmula-no-such-tool", "install it").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("heartmula-no-such-tool"));
        assert!(message.contains("install it"));
    }
}
