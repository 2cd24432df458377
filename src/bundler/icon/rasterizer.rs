//! Rasterizer backends.
//!
//! `rsvg-convert` renders the vector natively and is preferred; ImageMagick
//! is an equivalent fallback that resizes with a transparent background.

use crate::bundler::builder::tool_detection::{IMAGEMAGICK, RSVG_CONVERT};
use crate::bundler::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Renders a vector source to a square PNG.
pub trait Rasterizer: Send + Sync {
    /// Backend name for logs and errors.
    fn name(&self) -> &str;

    /// Writes a `pixels × pixels` PNG with transparency to `output`.
    fn rasterize(&self, source: &Path, pixels: u32, output: &Path) -> Result<()>;
}

/// librsvg's `rsvg-convert`.
#[derive(Debug, Clone)]
pub struct RsvgConvert {
    program: PathBuf,
}

impl RsvgConvert {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Rasterizer for RsvgConvert {
    fn name(&self) -> &str {
        "rsvg-convert"
    }

    fn rasterize(&self, source: &Path, pixels: u32, output: &Path) -> Result<()> {
        let size = pixels.to_string();
        let mut command = Command::new(&self.program);
        command
            .args(["--width", &size, "--height", &size, "--format", "png", "--output"])
            .arg(output)
            .arg(source);
        run(self.name(), command)
    }
}

/// ImageMagick 7 `magick` or 6 `convert`.
#[derive(Debug, Clone)]
pub struct ImageMagick {
    program: PathBuf,
}

impl ImageMagick {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Rasterizer for ImageMagick {
    fn name(&self) -> &str {
        "imagemagick"
    }

    fn rasterize(&self, source: &Path, pixels: u32, output: &Path) -> Result<()> {
        let geometry = format!("{pixels}x{pixels}");
        let mut command = Command::new(&self.program);
        command
            .args(["-background", "none", "-density", "1024"])
            .arg(source)
            .args(["-resize", &geometry, "-gravity", "center", "-extent", &geometry])
            .arg(format!("PNG32:{}", output.display()));
        run(self.name(), command)
    }
}

fn run(tool: &str, mut command: Command) -> Result<()> {
    log::debug!("Running {:?}", command);
    let output = command.output().map_err(|e| Error::ToolFailed {
        tool: tool.to_string(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(Error::ToolFailed {
            tool: tool.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Picks the first available backend, `rsvg-convert` before ImageMagick.
pub fn detect() -> Option<Box<dyn Rasterizer>> {
    if let Some(path) = RSVG_CONVERT.as_ref() {
        return Some(Box::new(RsvgConvert::new(path)));
    }
    if let Some(path) = IMAGEMAGICK.as_ref() {
        log::info!("rsvg-convert not found, falling back to ImageMagick");
        return Some(Box::new(ImageMagick::new(path)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_reports_tool_failure() {
        let backend = RsvgConvert::new("/nonexistent/rsvg-convert");
        let tmp = tempfile::tempdir().unwrap();
        let err = backend
            .rasterize(&tmp.path().join("icon.svg"), 16, &tmp.path().join("out.png"))
            .unwrap_err();
        assert!(matches!(err, Error::ToolFailed { ref tool, .. } if tool == "rsvg-convert"));
    }
}
