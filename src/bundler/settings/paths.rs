//! Project-relative locations of pipeline inputs and outputs.

use serde::Deserialize;
use std::path::PathBuf;

/// Input and output locations, relative to the project root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Vector icon source.
    pub icon_source: PathBuf,

    /// Assembled icon container.
    pub icon_output: PathBuf,

    /// Interpreter entry point that the launcher runs.
    pub entry_point: PathBuf,

    /// Extra freezer hooks directory.
    pub hooks_dir: PathBuf,

    /// Scratch space for freezing and iconset rasterization.
    pub work_dir: PathBuf,

    /// Where the `.app` and the disk image are written.
    pub dist_dir: PathBuf,

    /// Launcher shortcut shipped next to the app in the disk image.
    pub launcher_shortcut: PathBuf,

    /// README shipped in the disk image and next to it.
    pub readme: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            icon_source: "build/macos/icon.svg".into(),
            icon_output: "build/macos/HeartMuLa.icns".into(),
            entry_point: "launcher.py".into(),
            hooks_dir: "build/macos/hooks".into(),
            work_dir: "build/macos/work".into(),
            dist_dir: "dist".into(),
            launcher_shortcut: "build/macos/Launch HeartMuLa.command".into(),
            readme: "build/macos/README.txt".into(),
        }
    }
}
