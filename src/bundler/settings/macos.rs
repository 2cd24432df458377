//! macOS signing and disk image settings.

use serde::Deserialize;
use std::path::PathBuf;

/// Code signing configuration.
///
/// # Configuration
///
/// ```toml
/// [macos]
/// entitlements = "build/macos/entitlements.plist"
/// signing_jobs = 4
/// ```
///
/// The identity itself comes from `--identity` / `CODESIGN_IDENTITY`, not from
/// this file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MacOsSettings {
    /// Entitlements applied in hardened mode to executables and the bundle root.
    ///
    /// Relative to the project root. Default: None
    pub entitlements: Option<PathBuf>,

    /// Worker threads per depth level while signing.
    ///
    /// Default: None (number of CPUs)
    pub signing_jobs: Option<usize>,
}

/// Disk image configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DmgSettings {
    /// hdiutil image format. Default: "UDZO" (zlib-compressed, read-only)
    pub format: String,

    /// Mounted volume name. Default: None (product name)
    pub volume_name: Option<String>,
}

impl Default for DmgSettings {
    fn default() -> Self {
        Self {
            format: "UDZO".into(),
            volume_name: None,
        }
    }
}

/// Post-package smoke test configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SmokeSettings {
    /// Unauthenticated readiness endpoint exposed by the backend.
    pub health_url: String,

    /// How long to wait for the endpoint to report ready.
    pub timeout_secs: u64,
}

impl Default for SmokeSettings {
    fn default() -> Self {
        Self {
            health_url: "http://127.0.0.1:8000/health".into(),
            timeout_secs: 120,
        }
    }
}
