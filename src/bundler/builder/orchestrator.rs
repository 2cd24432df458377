//! Release pipeline orchestration.
//!
//! This module provides the [`ReleasePipeline`] driver that runs the stages in
//! order against one immutable [`Settings`] and stops at the first failure.

use crate::bundler::{
    Settings, SigningMode,
    builder::checksum,
    error::ErrorExt,
    icon::{self, IconError, IconSpec, Rasterizer},
    platform::macos::{
        app::{self, AppBundle, BundleError, BundleManifest},
        dmg::{self, Companions, DiskImageBuilder, Hdiutil, PackageError, ReleaseArtifact},
        freeze::{Freezer, PyInstaller},
        launcher::{self, DataLocations, LauncherError, SmokeReport},
        sign::{CodeSigner, CodesignTool, SignedBundle, Signer},
    },
    utils::{fs, lock},
    validation::{self, Severity, ValidationReport},
};
use crate::error::{ReleaseError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MANIFEST_FILE: &str = "release.json";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Validate,
    BuildIcon,
    Bundle,
    Sign,
    Package,
    SmokeTest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Validate => "validate",
            Stage::BuildIcon => "build-icon",
            Stage::Bundle => "bundle",
            Stage::Sign => "sign",
            Stage::Package => "package",
            Stage::SmokeTest => "smoke-test",
        })
    }
}

/// Signing summary recorded in the manifest.
#[derive(Debug, Clone, Serialize)]
pub struct SigningSummary {
    pub mode: SigningMode,
    pub identity: String,
    /// Targets signed in this run; zero when an existing signature was re-verified.
    pub targets: usize,
    pub hardened: usize,
    pub warnings: Vec<String>,
}

/// `release.json`, written next to the disk image.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseManifest {
    pub product: String,
    pub version: String,
    pub identifier: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub artifact: ReleaseArtifact,
    /// Digest of the signed `.app` tree that went into the image.
    pub bundle_sha256: String,
    pub signing: SigningSummary,
}

impl ReleaseManifest {
    fn new(
        settings: &Settings,
        signed: &SignedBundle,
        artifact: ReleaseArtifact,
        bundle_sha256: String,
    ) -> Self {
        let report = signed.report();
        let identity = settings.signing_identity();
        Self {
            product: settings.product_name().to_string(),
            version: settings.version_string().to_string(),
            identifier: settings.package().identifier.clone(),
            created_at: chrono::Utc::now(),
            artifact,
            bundle_sha256,
            signing: SigningSummary {
                mode: identity.mode,
                identity: identity.identifier.clone(),
                targets: report.signed.len(),
                hardened: report.signed.iter().filter(|s| s.hardened).count(),
                warnings: report.warnings.iter().map(ToString::to_string).collect(),
            },
        }
    }

    /// Writes pretty JSON to `path`.
    pub async fn write(&self, path: &Path) -> crate::bundler::Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .fs_context("writing release manifest", path)
    }
}

/// Everything a full `release` run produced.
#[derive(Debug)]
pub struct ReleaseOutcome {
    pub validation: ValidationReport,
    pub icon: PathBuf,
    pub data_locations: DataLocations,
    pub signed: SignedBundle,
    pub manifest: ReleaseManifest,
    pub manifest_path: PathBuf,
}

/// Drives the release stages.
///
/// External tools are found on PATH when a stage first needs them; tests and
/// embedders can inject their own implementations instead.
///
/// # Examples
///
/// ```no_run
/// use heartmula_release::bundler::{ReleasePipeline, SettingsBuilder};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = SettingsBuilder::new().project_root(".").build()?;
/// let outcome = ReleasePipeline::new(settings).release().await?;
/// println!("{}", outcome.manifest.artifact.disk_image.display());
/// # Ok(())
/// # }
/// ```
pub struct ReleasePipeline {
    settings: Settings,
    rasterizer: Option<Box<dyn Rasterizer>>,
    freezer: Option<Box<dyn Freezer>>,
    code_signer: Option<Box<dyn CodeSigner>>,
    image_builder: Option<Box<dyn DiskImageBuilder>>,
}

impl fmt::Debug for ReleasePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleasePipeline")
            .field("settings", &self.settings)
            .field("rasterizer", &self.rasterizer.as_ref().map(|r| r.name()))
            .field("freezer", &self.freezer.as_ref().map(|r| r.name()))
            .field("code_signer", &self.code_signer.as_ref().map(|_| "<injected>"))
            .field("image_builder", &self.image_builder.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl ReleasePipeline {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            rasterizer: None,
            freezer: None,
            code_signer: None,
            image_builder: None,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Box<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn with_freezer(mut self, freezer: Box<dyn Freezer>) -> Self {
        self.freezer = Some(freezer);
        self
    }

    pub fn with_code_signer(mut self, signer: Box<dyn CodeSigner>) -> Self {
        self.code_signer = Some(signer);
        self
    }

    pub fn with_image_builder(mut self, builder: Box<dyn DiskImageBuilder>) -> Self {
        self.image_builder = Some(builder);
        self
    }

    /// Returns a reference to the pipeline settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// `dist/release.json`.
    pub fn manifest_path(&self) -> PathBuf {
        self.settings.dist_dir().join(MANIFEST_FILE)
    }

    /// Takes the per-work-dir run lock.
    pub fn lock(&self) -> Result<lock::RunLock> {
        lock::acquire(&self.settings.work_dir()).map_err(ReleaseError::Lock)
    }

    /// Runs every rule and reports, without gating.
    pub fn check_inputs(&self) -> ValidationReport {
        log::info!(
            "Validating release inputs in {}",
            self.settings.project_root().display()
        );
        let report = validation::validate(
            self.settings.validation_rules(),
            self.settings.project_root(),
        );
        for outcome in report.failures() {
            if outcome.rule.severity == Severity::Warning {
                log::warn!("{}", outcome.line());
            }
        }
        log::info!("Validation: {}", report.summary());
        report
    }

    /// Validation stage: fails when any ERROR rule failed.
    pub fn validate(&self) -> Result<ValidationReport> {
        let report = self.check_inputs();
        report.gate()?;
        Ok(report)
    }

    /// Icon stage: writes the `.icns` at [`Settings::icon_output`].
    pub async fn build_icon(&self) -> Result<PathBuf> {
        let source = self.settings.icon_source();
        let output = self.settings.icon_output();
        if !source.is_file() {
            return Err(IconError::MissingSourceAsset { path: source }.into());
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent, false)
                .await
                .map_err(IconError::from)?;
        }
        let spec = IconSpec::macos();
        let icon = match self.rasterizer.as_deref() {
            Some(rasterizer) => {
                log::info!("Generating {} with {}", output.display(), rasterizer.name());
                icon::generate(&source, &output, &spec, rasterizer)?
            }
            None => icon::generate_with_detected(&source, &output, &spec)?,
        };
        Ok(icon)
    }

    /// Bundle stage: freezes the entry point and writes the `.app`.
    pub async fn bundle(&self) -> Result<AppBundle> {
        let mut manifest = BundleManifest::from_settings(&self.settings)?;
        let discovered = manifest.resolve_imports(self.settings.project_root())?;
        log::debug!("{} local modules reachable from the entry point", discovered);

        let detected;
        let freezer: &dyn Freezer = match self.freezer.as_deref() {
            Some(freezer) => freezer,
            None => {
                detected = PyInstaller::detect().ok_or_else(|| BundleError::FreezeFailed {
                    freezer: "pyinstaller".into(),
                    reason: "not found on PATH".into(),
                })?;
                &detected
            }
        };

        Ok(app::materialize(&manifest, freezer, &self.settings).await?)
    }

    /// Reopens the `.app` written by an earlier `bundle` run.
    pub fn open_bundle(&self) -> Result<AppBundle> {
        Ok(AppBundle::open(&self.settings.app_bundle_path())?)
    }

    /// Resolves the user-space locations the launcher hands the backend and
    /// refuses any that would land inside `bundle`.
    pub fn check_data_locations(&self, bundle: &AppBundle) -> Result<DataLocations> {
        let locations = DataLocations::for_user(self.settings.executable_name())
            .map_err(ReleaseError::DataLocations)?;
        ensure_outside(bundle, locations)
    }

    /// Sign stage: inside-out signing, then full verification.
    pub fn sign(&self, bundle: AppBundle) -> Result<SignedBundle> {
        let located;
        let tool: &dyn CodeSigner = match self.code_signer.as_deref() {
            Some(tool) => tool,
            None => {
                located = CodesignTool::locate().map_err(|source| ReleaseError::ToolUnavailable {
                    stage: Stage::Sign,
                    source,
                })?;
                &located
            }
        };

        let signed = Signer::new(tool, self.settings.signing_jobs())
            .with_entitlements(self.settings.entitlements())
            .sign(bundle, self.settings.signing_identity())?;
        Ok(signed)
    }

    /// Re-verifies a bundle signed by an earlier run.
    pub fn verify_existing(&self, bundle: AppBundle) -> Result<SignedBundle> {
        let located;
        let tool: &dyn CodeSigner = match self.code_signer.as_deref() {
            Some(tool) => tool,
            None => {
                located = CodesignTool::locate().map_err(|source| ReleaseError::ToolUnavailable {
                    stage: Stage::Package,
                    source,
                })?;
                &located
            }
        };
        Ok(Signer::new(tool, 1).verify_existing(bundle)?)
    }

    /// Package stage: disk image, checksum and `release.json`.
    pub async fn package(&self, signed: &SignedBundle) -> Result<ReleaseManifest> {
        let located;
        let builder: &dyn DiskImageBuilder = match self.image_builder.as_deref() {
            Some(builder) => builder,
            None => {
                located = Hdiutil::locate().map_err(|source| ReleaseError::ToolUnavailable {
                    stage: Stage::Package,
                    source,
                })?;
                &located
            }
        };

        let companions = Companions::from_settings(&self.settings);
        let artifact = dmg::package(signed, &companions, builder, &self.settings).await?;
        let bundle_sha256 = checksum::calculate_sha256(signed.bundle().root())
            .await
            .map_err(PackageError::from)?;
        log::debug!("{} sha256 {}", signed.bundle().root().display(), bundle_sha256);

        let manifest = ReleaseManifest::new(&self.settings, signed, artifact, bundle_sha256);
        let path = self.manifest_path();
        manifest.write(&path).await.map_err(ReleaseError::Manifest)?;
        log::info!("Wrote {}", path.display());
        Ok(manifest)
    }

    /// Every stage in order under the run lock.
    pub async fn release(&self) -> Result<ReleaseOutcome> {
        let _lock = self.lock()?;

        let validation = self.validate()?;
        let icon = self.build_icon().await?;
        let bundle = self.bundle().await?;
        let data_locations = self.check_data_locations(&bundle)?;
        let signed = self.sign(bundle)?;
        let manifest = self.package(&signed).await?;

        Ok(ReleaseOutcome {
            validation,
            icon,
            data_locations,
            signed,
            manifest,
            manifest_path: self.manifest_path(),
        })
    }

    /// Boots the built bundle against scratch storage and polls the health URL.
    pub async fn smoke_test(&self) -> Result<SmokeReport> {
        let bundle = self.open_bundle()?;
        self.check_data_locations(&bundle)?;
        let work_dir = self.settings.work_dir();
        fs::create_dir_all(&work_dir, false)
            .await
            .map_err(LauncherError::from)?;
        let scratch = tempfile::Builder::new()
            .prefix("smoke-")
            .tempdir_in(&work_dir)
            .fs_context("creating smoke test scratch directory", &work_dir)
            .map_err(LauncherError::from)?;

        let smoke = self.settings.smoke();
        let report = launcher::smoke_test(
            &bundle,
            &smoke.health_url,
            Duration::from_secs(smoke.timeout_secs),
            scratch.path(),
        )
        .await?;
        Ok(report)
    }
}

fn ensure_outside(bundle: &AppBundle, locations: DataLocations) -> Result<DataLocations> {
    locations
        .check_outside(bundle.root())
        .map_err(ReleaseError::DataLocations)?;
    Ok(locations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::SettingsBuilder;
    use crate::bundler::SigningIdentity;
    use crate::bundler::platform::macos::app::tests::{FakeFreezer, project};
    use crate::bundler::platform::macos::dmg::tests::ListingImageBuilder;
    use crate::bundler::platform::macos::sign::{SignRequest, SigningTarget};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct CountingRasterizer {
        calls: Arc<Mutex<usize>>,
    }

    impl Rasterizer for CountingRasterizer {
        fn name(&self) -> &str {
            "counting"
        }

        fn rasterize(&self, _source: &Path, pixels: u32, output: &Path) -> crate::bundler::Result<()> {
            *self.calls.lock().unwrap() += 1;
            image::RgbaImage::from_pixel(pixels, pixels, image::Rgba([10, 20, 30, 128])).save(output)?;
            Ok(())
        }
    }

    /// Records signed paths; optionally fails plain signing or verification.
    #[derive(Default, Clone)]
    struct ScriptedSigner {
        signed: Arc<Mutex<Vec<PathBuf>>>,
        fail_plain: bool,
        fail_verify: bool,
    }

    impl CodeSigner for ScriptedSigner {
        fn sign(&self, target: &SigningTarget, _request: &SignRequest<'_>) -> crate::bundler::Result<()> {
            if self.fail_plain {
                crate::bail!("errSecInternalComponent");
            }
            self.signed.lock().unwrap().push(target.path.clone());
            Ok(())
        }

        fn verify(&self, _bundle_root: &Path) -> crate::bundler::Result<()> {
            if self.fail_verify {
                crate::bail!("a sealed resource is missing or invalid");
            }
            Ok(())
        }
    }

    fn release_project(root: &Path) {
        project(root);
        let macos = root.join("build/macos");
        std::fs::create_dir_all(macos.join("hooks")).unwrap();
        std::fs::write(
            macos.join("icon.svg"),
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="1024" height="1024"/>"#,
        )
        .unwrap();
        std::fs::write(macos.join("Launch HeartMuLa.command"), "#!/bin/sh\nopen -a 'HeartMuLa Studio'\n").unwrap();
        std::fs::write(macos.join("README.txt"), "Drag HeartMuLa Studio to Applications.\n").unwrap();
        std::fs::write(
            root.join("backend/requirements.txt"),
            "fastapi==0.110\nuvicorn[standard]\npywebview\nnumpy<2\n",
        )
        .unwrap();
    }

    fn pipeline(root: &Path, signer: ScriptedSigner, rasterizer: CountingRasterizer) -> ReleasePipeline {
        let settings = SettingsBuilder::new()
            .project_root(root)
            .signing_identity(SigningIdentity::ad_hoc())
            .build()
            .unwrap();
        ReleasePipeline::new(settings)
            .with_rasterizer(Box::new(rasterizer))
            .with_freezer(Box::new(FakeFreezer))
            .with_code_signer(Box::new(signer))
            .with_image_builder(Box::new(ListingImageBuilder::default()))
    }

    #[test]
    fn stage_names_match_subcommands() {
        assert_eq!(Stage::BuildIcon.to_string(), "build-icon");
        assert_eq!(Stage::SmokeTest.to_string(), "smoke-test");
    }

    #[tokio::test]
    async fn release_produces_image_checksum_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        release_project(tmp.path());
        let signer = ScriptedSigner::default();
        let pipeline = pipeline(tmp.path(), signer.clone(), CountingRasterizer::default());

        let outcome = pipeline.release().await.unwrap();

        assert!(outcome.validation.all_passed());
        assert!(outcome.icon.is_file());
        assert!(outcome.manifest.artifact.disk_image.is_file());
        assert!(outcome.manifest.artifact.checksum_file.is_file());

        // Root is signed last.
        let signed = signer.signed.lock().unwrap();
        assert_eq!(signed.last().unwrap(), &pipeline.settings().app_bundle_path());

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&outcome.manifest_path).unwrap()).unwrap();
        assert_eq!(json["signing"]["mode"], "ad_hoc");
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["artifact"]["sha256"], outcome.manifest.artifact.sha256.as_str());

        // The recorded tree digest is the signed bundle's, not the image's.
        let bundle_digest = checksum::calculate_sha256(&pipeline.settings().app_bundle_path())
            .await
            .unwrap();
        assert_eq!(outcome.manifest.bundle_sha256, bundle_digest);
        assert_ne!(outcome.manifest.bundle_sha256, outcome.manifest.artifact.sha256);
        assert_eq!(json["bundle_sha256"], bundle_digest.as_str());

        assert!(outcome.data_locations.models.ends_with("Library/Application Support/HeartMuLa/models"));
        assert!(!outcome.data_locations.database.starts_with(outcome.signed.bundle().root()));
    }

    #[tokio::test]
    async fn data_locations_inside_bundle_fail_bundle_stage() {
        let tmp = tempfile::tempdir().unwrap();
        release_project(tmp.path());
        let pipeline = pipeline(tmp.path(), ScriptedSigner::default(), CountingRasterizer::default());
        let bundle = pipeline.bundle().await.unwrap();
        let inside = DataLocations::under(&bundle.root().join("Contents/Resources"));

        let err = ensure_outside(&bundle, inside).unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Bundle));
        assert!(matches!(
            err,
            ReleaseError::DataLocations(LauncherError::InsideBundle { var: launcher::MODEL_DIR_VAR, .. })
        ));
        assert!(pipeline.check_data_locations(&bundle).is_ok());
    }

    #[tokio::test]
    async fn validation_failure_stops_before_icon() {
        let tmp = tempfile::tempdir().unwrap();
        let rasterizer = CountingRasterizer::default();
        let pipeline = pipeline(tmp.path(), ScriptedSigner::default(), rasterizer.clone());

        let err = pipeline.release().await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Validate));
        assert_eq!(*rasterizer.calls.lock().unwrap(), 0);
        assert!(!pipeline.settings().app_bundle_path().exists());
    }

    #[tokio::test]
    async fn signing_failure_produces_no_image() {
        let tmp = tempfile::tempdir().unwrap();
        release_project(tmp.path());
        let signer = ScriptedSigner {
            fail_plain: true,
            ..Default::default()
        };
        let pipeline = pipeline(tmp.path(), signer, CountingRasterizer::default());

        let err = pipeline.release().await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Sign));
        assert!(!pipeline.settings().disk_image_path().exists());
        assert!(!pipeline.manifest_path().exists());
    }

    #[tokio::test]
    async fn verification_failure_is_terminal() {
        let tmp = tempfile::tempdir().unwrap();
        release_project(tmp.path());
        let signer = ScriptedSigner {
            fail_verify: true,
            ..Default::default()
        };
        let pipeline = pipeline(tmp.path(), signer, CountingRasterizer::default());

        let err = pipeline.release().await.unwrap_err();

        assert!(matches!(err, ReleaseError::Verification { .. }));
        assert!(!pipeline.settings().disk_image_path().exists());
    }

    #[tokio::test]
    async fn package_reverifies_existing_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        release_project(tmp.path());
        let pipeline = pipeline(tmp.path(), ScriptedSigner::default(), CountingRasterizer::default());
        pipeline.bundle().await.unwrap();

        let signed = pipeline.verify_existing(pipeline.open_bundle().unwrap()).unwrap();
        let manifest = pipeline.package(&signed).await.unwrap();

        assert_eq!(manifest.signing.targets, 0);
        assert!(manifest.artifact.disk_image.is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn concurrent_run_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        release_project(tmp.path());
        let pipeline = pipeline(tmp.path(), ScriptedSigner::default(), CountingRasterizer::default());
        let _held = lock::acquire(&pipeline.settings().work_dir()).unwrap();

        let err = pipeline.release().await.unwrap_err();

        assert!(matches!(err, ReleaseError::Lock(_)));
    }
}
