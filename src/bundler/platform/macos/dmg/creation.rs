//! Staging and `hdiutil` image creation.

use super::PackageError;
use crate::bundler::{
    builder::tool_detection,
    error::{Error, ErrorExt, Result},
    utils::fs,
};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Compresses a staging directory into a disk image.
pub trait DiskImageBuilder: Send + Sync {
    fn name(&self) -> &str;

    /// Writes `output` from the contents of `staging`, replacing any existing file.
    fn create(&self, staging: &Path, volume_name: &str, format: &str, output: &Path) -> Result<()>;
}

/// macOS `hdiutil`.
#[derive(Debug, Clone)]
pub struct Hdiutil {
    program: PathBuf,
}

impl Hdiutil {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn locate() -> Result<Self> {
        tool_detection::require("hdiutil", "disk images can only be built on macOS").map(Self::new)
    }
}

impl DiskImageBuilder for Hdiutil {
    fn name(&self) -> &str {
        "hdiutil"
    }

    fn create(&self, staging: &Path, volume_name: &str, format: &str, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .args(["create", "-volname", volume_name, "-srcfolder"])
            .arg(staging)
            .args(["-ov", "-format", format])
            .arg(output);
        log::info!("Creating {} disk image...", format);
        log::debug!("Running {:?}", command);

        let result = command.output().map_err(|e| Error::ToolFailed {
            tool: "hdiutil".into(),
            reason: format!("failed to execute: {}", e),
        })?;
        if !result.status.success() {
            return Err(Error::ToolFailed {
                tool: "hdiutil".into(),
                reason: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Fails on the first companion file that is missing.
pub fn check_companions(companions: &[&Path]) -> std::result::Result<(), PackageError> {
    for path in companions {
        if !path.is_file() {
            return Err(PackageError::StagingAssembly {
                path: path.to_path_buf(),
                reason: "companion file is missing".into(),
            });
        }
    }
    Ok(())
}

/// Copies the bundle and companions into `staging` and adds the
/// `Applications` link for drag-to-install.
///
/// Returns the staged entry names.
pub async fn assemble_staging(
    staging: &Path,
    app_bundle: &Path,
    companions: &[&Path],
) -> std::result::Result<Vec<String>, PackageError> {
    let mut entries = Vec::new();
    let file_name = |path: &Path| -> std::result::Result<String, PackageError> {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PackageError::StagingAssembly {
                path: path.to_path_buf(),
                reason: "path has no file name".into(),
            })
    };

    let app_name = file_name(app_bundle)?;
    log::debug!("Copying .app to staging: {}", staging.join(&app_name).display());
    fs::copy_dir(app_bundle, &staging.join(&app_name)).await?;
    entries.push(app_name);

    for companion in companions {
        let name = file_name(companion)?;
        fs::copy_file(companion, &staging.join(&name)).await?;
        entries.push(name);
    }

    let applications_link = staging.join("Applications");
    fs::symlink(Path::new("/Applications"), &applications_link)
        .fs_context("creating Applications symlink", &applications_link)?;
    entries.push("Applications".into());

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_missing_companion_is_named() {
        let tmp = tempfile::tempdir().unwrap();
        let present = tmp.path().join("README.txt");
        std::fs::write(&present, "read me").unwrap();
        let missing = tmp.path().join("Launch HeartMuLa.command");

        let err = check_companions(&[&present, &missing]).unwrap_err();

        assert!(matches!(err, PackageError::StagingAssembly { ref path, .. } if *path == missing));
    }
}
