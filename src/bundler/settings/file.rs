//! `release.toml` loading.
//!
//! Every section is optional; missing sections keep their defaults.

use super::{BundleSettings, DmgSettings, MacOsSettings, PackageSettings, PathSettings, SmokeSettings};
use crate::bundler::validation::ValidationRule;
use serde::Deserialize;
use std::path::Path;

/// File name looked up at the project root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "release.toml";

/// Raw contents of `release.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseFile {
    /// `[package]`
    pub package: PackageSettings,
    /// `[paths]`
    pub paths: PathSettings,
    /// `[bundle]`
    pub bundle: BundleSettings,
    /// `[macos]`
    pub macos: MacOsSettings,
    /// `[dmg]`
    pub dmg: DmgSettings,
    /// `[smoke]`
    pub smoke: SmokeSettings,
    /// `[validation]`
    pub validation: ValidationSection,
}

/// `[validation]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    /// Replaces the default rule set when non-empty.
    pub rules: Vec<ValidationRule>,
}

/// Errors reading `release.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Config path
        path: String,
        /// IO error
        source: std::io::Error,
    },
    /// File is not valid TOML for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Config path
        path: String,
        /// TOML error
        source: toml::de::Error,
    },
}

impl ReleaseFile {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let file: ReleaseFile = toml::from_str(
            r#"
            [package]
            version = "2.1.0"

            [bundle]
            placeholders = ["models"]
            "#,
        )
        .unwrap();

        assert_eq!(file.package.version, "2.1.0");
        assert_eq!(file.package.product_name, "HeartMuLa Studio");
        assert_eq!(file.bundle.placeholders, vec![std::path::PathBuf::from("models")]);
        assert!(!file.bundle.packages.is_empty());
        assert_eq!(file.dmg.format, "UDZO");
        assert!(file.validation.rules.is_empty());
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let err = toml::from_str::<ReleaseFile>("[signing]\nidentity = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("signing"));
    }
}
