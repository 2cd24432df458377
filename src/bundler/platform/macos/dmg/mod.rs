//! Disk image packaging.
//!
//! Accepts only a [`SignedBundle`]. Companion files are checked before any
//! copying or compression; the staging directory is a temporary directory
//! under the work dir and disappears with the run.
//!
//! Staged layout:
//!
//! ```text
//! HeartMuLa Studio.app
//! Launch HeartMuLa.command
//! README.txt
//! Applications -> /Applications
//! ```

mod creation;

use super::sign::SignedBundle;
use crate::bundler::{builder::checksum, error::ErrorExt, settings::Settings, utils::fs};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use creation::{DiskImageBuilder, Hdiutil, assemble_staging, check_companions};

/// Packaging failures.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// A file that belongs in the image is missing or unusable.
    #[error("staging assembly failed for {}: {reason}", path.display())]
    StagingAssembly {
        /// Offending file
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// The image tool failed.
    #[error("{tool} failed to create {}: {reason}", output.display())]
    DiskImageFailed {
        /// Tool name
        tool: String,
        /// Image being written
        output: PathBuf,
        /// Tool output
        reason: String,
    },

    /// Filesystem error while staging.
    #[error(transparent)]
    Bundler(#[from] crate::bundler::Error),
}

/// Files shipped next to the app inside the image.
#[derive(Debug, Clone)]
pub struct Companions {
    pub launcher_shortcut: PathBuf,
    pub readme: PathBuf,
}

impl Companions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            launcher_shortcut: settings.launcher_shortcut(),
            readme: settings.readme(),
        }
    }

    fn paths(&self) -> [&Path; 2] {
        [&self.launcher_shortcut, &self.readme]
    }
}

/// The distributable.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseArtifact {
    pub disk_image: PathBuf,
    /// Hex SHA-256 of the image.
    pub sha256: String,
    pub checksum_file: PathBuf,
    pub size_bytes: u64,
    /// Top-level entries of the mounted volume.
    pub contents: Vec<String>,
}

/// Stages the signed bundle with its companions and builds the image at
/// [`Settings::disk_image_path`].
pub async fn package(
    signed: &SignedBundle,
    companions: &Companions,
    builder: &dyn DiskImageBuilder,
    settings: &Settings,
) -> Result<ReleaseArtifact, PackageError> {
    check_companions(&companions.paths())?;

    let output = settings.disk_image_path();
    log::info!("Creating disk image for {}", settings.product_name());

    let work_dir = settings.work_dir();
    fs::create_dir_all(&work_dir, false).await?;
    let staging = tempfile::Builder::new()
        .prefix("dmg-staging-")
        .tempdir_in(&work_dir)
        .map_err(|e| PackageError::StagingAssembly {
            path: work_dir.clone(),
            reason: format!("cannot create staging directory: {e}"),
        })?;

    let contents =
        assemble_staging(staging.path(), signed.bundle().root(), &companions.paths()).await?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent, false).await?;
    }
    fs::remove_file(&output).await?;
    builder
        .create(staging.path(), settings.volume_name(), &settings.dmg().format, &output)
        .map_err(|e| PackageError::DiskImageFailed {
            tool: builder.name().to_string(),
            output: output.clone(),
            reason: e.to_string(),
        })?;
    drop(staging);

    let sha256 = checksum::calculate_sha256(&output).await?;
    let checksum_file = checksum::write_checksum_file(&output, &sha256).await?;
    let size_bytes = tokio::fs::metadata(&output)
        .await
        .fs_context("reading disk image metadata", &output)?
        .len();

    log::info!("✓ Created disk image: {} ({} bytes)", output.display(), size_bytes);
    Ok(ReleaseArtifact {
        disk_image: output,
        sha256,
        checksum_file,
        size_bytes,
        contents,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bundler::SettingsBuilder;
    use crate::bundler::SigningIdentity;
    use crate::bundler::platform::macos::app::tests::skeleton;
    use crate::bundler::platform::macos::sign::{CodeSigner, SignRequest, Signer, SigningTarget};
    use std::sync::Mutex;

    /// Writes the sorted staging listing as the "image".
    #[derive(Default)]
    pub(crate) struct ListingImageBuilder {
        pub(crate) calls: Mutex<usize>,
    }

    impl DiskImageBuilder for ListingImageBuilder {
        fn name(&self) -> &str {
            "listing"
        }

        fn create(
            &self,
            staging: &Path,
            volume_name: &str,
            format: &str,
            output: &Path,
        ) -> crate::bundler::Result<()> {
            *self.calls.lock().unwrap() += 1;
            let mut names: Vec<String> = std::fs::read_dir(staging)?
                .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
                .collect::<std::io::Result<_>>()?;
            names.sort();
            std::fs::write(output, format!("{volume_name}|{format}|{}", names.join(",")))?;
            Ok(())
        }
    }

    pub(crate) struct AcceptAll;

    impl CodeSigner for AcceptAll {
        fn sign(&self, _: &SigningTarget, _: &SignRequest<'_>) -> crate::bundler::Result<()> {
            Ok(())
        }

        fn verify(&self, _: &Path) -> crate::bundler::Result<()> {
            Ok(())
        }
    }

    fn signed_project(root: &Path) -> (Settings, SignedBundle) {
        let settings = SettingsBuilder::new().project_root(root).build().unwrap();
        let bundle = skeleton(&settings.app_bundle_path(), settings.executable_name());
        let signed = Signer::new(&AcceptAll, 1)
            .sign(bundle, &SigningIdentity::ad_hoc())
            .unwrap();
        (settings, signed)
    }

    fn companions(settings: &Settings) -> Companions {
        let companions = Companions::from_settings(settings);
        std::fs::create_dir_all(companions.readme.parent().unwrap()).unwrap();
        std::fs::write(&companions.readme, "Drag the app to Applications.").unwrap();
        std::fs::write(&companions.launcher_shortcut, "#!/bin/sh\nopen -a 'HeartMuLa Studio'\n").unwrap();
        companions
    }

    #[tokio::test]
    async fn stages_app_companions_and_applications_link() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, signed) = signed_project(tmp.path());
        let companions = companions(&settings);
        let builder = ListingImageBuilder::default();

        let artifact = package(&signed, &companions, &builder, &settings).await.unwrap();

        assert_eq!(artifact.disk_image, tmp.path().join("dist/HeartMuLaStudio-1.0.0.dmg"));
        assert_eq!(
            std::fs::read_to_string(&artifact.disk_image).unwrap(),
            "HeartMuLa Studio|UDZO|Applications,HeartMuLa Studio.app,Launch HeartMuLa.command,README.txt"
        );
        assert_eq!(artifact.contents.len(), 4);
        assert!(
            std::fs::read_to_string(&artifact.checksum_file)
                .unwrap()
                .starts_with(&artifact.sha256)
        );
        // Staging is temporary.
        let leftovers: Vec<_> = std::fs::read_dir(settings.work_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("dmg-staging-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn missing_readme_fails_before_compression() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, signed) = signed_project(tmp.path());
        let companions = companions(&settings);
        std::fs::remove_file(&companions.readme).unwrap();
        let builder = ListingImageBuilder::default();

        let err = package(&signed, &companions, &builder, &settings).await.unwrap_err();

        assert!(matches!(err, PackageError::StagingAssembly { ref path, .. } if *path == companions.readme));
        assert_eq!(*builder.calls.lock().unwrap(), 0);
        assert!(!settings.disk_image_path().exists());
    }

    #[tokio::test]
    async fn rerun_replaces_previous_image() {
        let tmp = tempfile::tempdir().unwrap();
        let (settings, signed) = signed_project(tmp.path());
        let companions = companions(&settings);
        let builder = ListingImageBuilder::default();

        let first = package(&signed, &companions, &builder, &settings).await.unwrap();
        let second = package(&signed, &companions, &builder, &settings).await.unwrap();

        assert_eq!(first.sha256, second.sha256);
        assert_eq!(*builder.calls.lock().unwrap(), 2);
    }
}
