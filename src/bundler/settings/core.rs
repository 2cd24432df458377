//! Core Settings struct and implementations.

use super::{BundleSettings, DmgSettings, MacOsSettings, PackageSettings, PathSettings, SmokeSettings};
use crate::bundler::{SigningIdentity, validation::ValidationRule};
use std::path::{Path, PathBuf};

/// Immutable configuration for one pipeline run.
///
/// Built once at startup by [`SettingsBuilder`](super::SettingsBuilder) from
/// the command line, the environment and `release.toml`, then passed by
/// reference into every stage.
///
/// # Examples
///
/// ```no_run
/// use heartmula_release::bundler::{SettingsBuilder, SigningIdentity};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = SettingsBuilder::new()
///     .project_root(".")
///     .signing_identity(SigningIdentity::ad_hoc())
///     .build()?;
/// println!("{}", settings.app_bundle_path().display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Settings {
    project_root: PathBuf,
    package: PackageSettings,
    paths: PathSettings,
    bundle_settings: BundleSettings,
    macos: MacOsSettings,
    dmg: DmgSettings,
    smoke: SmokeSettings,
    validation_rules: Vec<ValidationRule>,
    identity: SigningIdentity,
}

impl Settings {
    /// Returns the product name.
    pub fn product_name(&self) -> &str {
        &self.package.product_name
    }

    /// Returns the executable name inside `Contents/MacOS`.
    pub fn executable_name(&self) -> &str {
        &self.package.executable_name
    }

    /// Returns the version string.
    pub fn version_string(&self) -> &str {
        &self.package.version
    }

    /// Returns the package metadata.
    pub fn package(&self) -> &PackageSettings {
        &self.package
    }

    /// Returns the absolute project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolves a project-relative path.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.project_root.join(relative)
    }

    /// Vector icon source.
    pub fn icon_source(&self) -> PathBuf {
        self.resolve(&self.paths.icon_source)
    }

    /// Assembled icon container.
    pub fn icon_output(&self) -> PathBuf {
        self.resolve(&self.paths.icon_output)
    }

    /// Interpreter entry point.
    pub fn entry_point(&self) -> PathBuf {
        self.resolve(&self.paths.entry_point)
    }

    /// Freezer hooks directory.
    pub fn hooks_dir(&self) -> PathBuf {
        self.resolve(&self.paths.hooks_dir)
    }

    /// Scratch directory for the run.
    pub fn work_dir(&self) -> PathBuf {
        self.resolve(&self.paths.work_dir)
    }

    /// Output directory for the bundle and disk image.
    pub fn dist_dir(&self) -> PathBuf {
        self.resolve(&self.paths.dist_dir)
    }

    /// Where the materialized `.app` lives.
    pub fn app_bundle_path(&self) -> PathBuf {
        self.dist_dir().join(format!("{}.app", self.product_name()))
    }

    /// Where the disk image is written: `{ProductName}-{Version}.dmg`.
    pub fn disk_image_path(&self) -> PathBuf {
        self.dist_dir().join(format!(
            "{}-{}.dmg",
            self.product_name().replace(' ', ""),
            self.version_string()
        ))
    }

    /// Launcher shortcut companion.
    pub fn launcher_shortcut(&self) -> PathBuf {
        self.resolve(&self.paths.launcher_shortcut)
    }

    /// README companion.
    pub fn readme(&self) -> PathBuf {
        self.resolve(&self.paths.readme)
    }

    /// Returns the bundle settings.
    pub fn bundle_settings(&self) -> &BundleSettings {
        &self.bundle_settings
    }

    /// Returns the signing settings.
    pub fn macos(&self) -> &MacOsSettings {
        &self.macos
    }

    /// Entitlements file, resolved against the project root.
    pub fn entitlements(&self) -> Option<PathBuf> {
        self.macos.entitlements.as_deref().map(|p| self.resolve(p))
    }

    /// Worker threads per signing depth level.
    pub fn signing_jobs(&self) -> usize {
        self.macos.signing_jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Returns the disk image settings.
    pub fn dmg(&self) -> &DmgSettings {
        &self.dmg
    }

    /// Mounted volume name.
    pub fn volume_name(&self) -> &str {
        self.dmg.volume_name.as_deref().unwrap_or(self.product_name())
    }

    /// Returns the smoke test settings.
    pub fn smoke(&self) -> &SmokeSettings {
        &self.smoke
    }

    /// Rules checked by the validator.
    pub fn validation_rules(&self) -> &[ValidationRule] {
        &self.validation_rules
    }

    /// Signing identity for this run.
    pub fn signing_identity(&self) -> &SigningIdentity {
        &self.identity
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        project_root: PathBuf,
        package: PackageSettings,
        paths: PathSettings,
        bundle_settings: BundleSettings,
        macos: MacOsSettings,
        dmg: DmgSettings,
        smoke: SmokeSettings,
        validation_rules: Vec<ValidationRule>,
        identity: SigningIdentity,
    ) -> Self {
        Self {
            project_root,
            package,
            paths,
            bundle_settings,
            macos,
            dmg,
            smoke,
            validation_rules,
            identity,
        }
    }
}
