//! Interpreter freezing.
//!
//! The freezer turns the entry point plus its imports into a self-contained
//! onedir tree: one executable and the interpreter runtime next to it.

use crate::bundler::builder::tool_detection::PYINSTALLER;
use crate::bundler::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Inputs for one freeze.
#[derive(Debug, Clone)]
pub struct FreezeRequest<'a> {
    /// Executable name inside the output tree.
    pub name: &'a str,
    /// Script to freeze.
    pub entry_point: &'a Path,
    /// Modules the freezer must include even if it cannot see the import.
    pub hidden_imports: &'a BTreeSet<String>,
    /// Packages whose data files, binaries and submodules are all collected.
    pub collect_all: &'a [String],
    /// Extra hook scripts, when present.
    pub hooks_dir: Option<&'a Path>,
    /// Scratch space for the freezer.
    pub work_dir: &'a Path,
    /// Parent of the onedir output.
    pub dist_dir: &'a Path,
}

/// Builds a frozen onedir tree.
pub trait Freezer: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the onedir directory containing `request.name`.
    fn freeze(&self, request: &FreezeRequest<'_>) -> Result<PathBuf>;
}

/// PyInstaller in `--onedir` mode.
#[derive(Debug, Clone)]
pub struct PyInstaller {
    program: PathBuf,
}

impl PyInstaller {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses the `pyinstaller` found on PATH.
    pub fn detect() -> Option<Self> {
        PYINSTALLER.as_ref().map(Self::new)
    }

    fn command(&self, request: &FreezeRequest<'_>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["--noconfirm", "--clean", "--onedir", "--log-level", "WARN"])
            .arg("--name")
            .arg(request.name)
            .arg("--distpath")
            .arg(request.dist_dir)
            .arg("--workpath")
            .arg(request.work_dir.join("pyinstaller"))
            .arg("--specpath")
            .arg(request.work_dir);

        if let Some(hooks) = request.hooks_dir {
            command.arg("--additional-hooks-dir").arg(hooks);
        }
        for module in request.hidden_imports {
            command.arg("--hidden-import").arg(module);
        }
        for package in request.collect_all {
            command.arg("--collect-all").arg(package);
        }
        command.arg(request.entry_point);
        command
    }
}

impl Freezer for PyInstaller {
    fn name(&self) -> &str {
        "pyinstaller"
    }

    fn freeze(&self, request: &FreezeRequest<'_>) -> Result<PathBuf> {
        let mut command = self.command(request);
        if let Some(project_dir) = request.entry_point.parent() {
            command.current_dir(project_dir);
        }

        log::info!(
            "Freezing {} ({} hidden imports, {} collected packages)",
            request.entry_point.display(),
            request.hidden_imports.len(),
            request.collect_all.len()
        );
        log::debug!("Running {:?}", command);

        let output = command.output().map_err(|e| Error::ToolFailed {
            tool: self.name().to_string(),
            reason: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(Error::ToolFailed {
                tool: self.name().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(request.dist_dir.join(request.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_carries_every_import_and_package() {
        let hidden: BTreeSet<String> = ["uvicorn.logging", "webview"].map(String::from).into();
        let collect = vec!["fastapi".to_string(), "heartlib".to_string()];
        let request = FreezeRequest {
            name: "HeartMuLa",
            entry_point: Path::new("/p/launcher.py"),
            hidden_imports: &hidden,
            collect_all: &collect,
            hooks_dir: Some(Path::new("/p/hooks")),
            work_dir: Path::new("/p/work"),
            dist_dir: Path::new("/p/work/dist"),
        };

        let command = PyInstaller::new("pyinstaller").command(&request);
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"--onedir".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "--hidden-import").count(), 2);
        assert_eq!(args.iter().filter(|a| *a == "--collect-all").count(), 2);
        assert!(args.windows(2).any(|w| w[0] == "--additional-hooks-dir" && w[1] == "/p/hooks"));
        assert_eq!(args.last().map(String::as_str), Some("/p/launcher.py"));
    }
}
