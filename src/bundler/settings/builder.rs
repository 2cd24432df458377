//! Builder for constructing Settings.

use super::file::{ConfigError, DEFAULT_CONFIG_FILE, ReleaseFile};
use super::{BundleSettings, PackageSettings, Settings};
use crate::bundler::{SigningIdentity, validation};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Builder for constructing [`Settings`].
///
/// # Examples
///
/// ```no_run
/// use heartmula_release::bundler::{SettingsBuilder, SigningIdentity};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = SettingsBuilder::new()
///     .project_root("/src/heartmula")
///     .config_file(Some("/src/heartmula/release.toml".into()))
///     .signing_identity(SigningIdentity::parse("Developer ID Application: Example (TEAMID)"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    project_root: Option<PathBuf>,
    config_file: Option<PathBuf>,
    package_settings: Option<PackageSettings>,
    bundle_settings: Option<BundleSettings>,
    identity: Option<SigningIdentity>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the project root. Default: current directory
    pub fn project_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.project_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Explicit config file. Default: `release.toml` at the root, if present
    pub fn config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Overrides `[package]` from the config file.
    pub fn package_settings(mut self, settings: PackageSettings) -> Self {
        self.package_settings = Some(settings);
        self
    }

    /// Overrides `[bundle]` from the config file.
    pub fn bundle_settings(mut self, settings: BundleSettings) -> Self {
        self.bundle_settings = Some(settings);
        self
    }

    /// Signing identity. Default: ad-hoc
    pub fn signing_identity(mut self, identity: SigningIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Fails if an explicit config file is missing or any config file is malformed.
    pub fn build(self) -> Result<Settings, ConfigError> {
        let root = self.project_root.unwrap_or_else(|| PathBuf::from("."));
        let root = root
            .absolutize()
            .map(|p| p.into_owned())
            .map_err(|source| ConfigError::Read {
                path: root.display().to_string(),
                source,
            })?;

        let file = match self.config_file {
            Some(path) => ReleaseFile::load(&root.join(path))?,
            None => {
                let implicit = root.join(DEFAULT_CONFIG_FILE);
                if implicit.is_file() {
                    log::debug!("Loading {}", implicit.display());
                    ReleaseFile::load(&implicit)?
                } else {
                    ReleaseFile::default()
                }
            }
        };

        let package = self.package_settings.unwrap_or(file.package);
        let bundle = self.bundle_settings.unwrap_or(file.bundle);
        let rules = if file.validation.rules.is_empty() {
            validation::default_rules(&file.paths, &bundle)
        } else {
            file.validation.rules
        };

        Ok(Settings::new(
            root,
            package,
            file.paths,
            bundle,
            file.macos,
            file.dmg,
            file.smoke,
            rules,
            self.identity.unwrap_or_else(SigningIdentity::ad_hoc),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::SigningMode;

    #[test]
    fn defaults_without_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = SettingsBuilder::new().project_root(tmp.path()).build().unwrap();

        assert_eq!(settings.signing_identity().mode, SigningMode::AdHoc);
        assert_eq!(
            settings.app_bundle_path(),
            tmp.path().join("dist/HeartMuLa Studio.app")
        );
        assert_eq!(
            settings.disk_image_path(),
            tmp.path().join("dist/HeartMuLaStudio-1.0.0.dmg")
        );
        assert!(!settings.validation_rules().is_empty());
        assert!(settings.signing_jobs() >= 1);
    }

    #[test]
    fn implicit_release_toml_is_loaded() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("release.toml"),
            "[package]\nversion = \"3.0.0\"\n\n[[validation.rules]]\npath = \"x\"\nkind = \"dir\"\n",
        )
        .unwrap();

        let settings = SettingsBuilder::new().project_root(tmp.path()).build().unwrap();

        assert_eq!(settings.version_string(), "3.0.0");
        assert_eq!(settings.validation_rules().len(), 1);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = SettingsBuilder::new()
            .project_root(tmp.path())
            .config_file(Some("nope.toml".into()))
            .build();
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
