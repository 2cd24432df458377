//! Top-level error type for the release pipeline.
//!
//! Every stage error maps into one [`ReleaseError`] variant. The variant
//! decides the stage named in the output, the recovery suggestions printed
//! under it and the process exit code.

use crate::bundler::{
    ConfigError, Stage,
    icon::IconError,
    platform::macos::{
        app::BundleError, dmg::PackageError, launcher::LauncherError, sign::SigningError,
    },
    validation::ValidationFailure,
};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all pipeline operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// Terminal output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `release.toml` could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Another run owns the work directory
    #[error("{0}")]
    Lock(#[source] crate::bundler::Error),

    /// Required inputs are missing or malformed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// Icon rasterization or assembly failed
    #[error("icon generation failed: {0}")]
    AssetGeneration(#[from] IconError),

    /// Freezing or bundle layout failed
    #[error("bundle composition failed: {0}")]
    BundleComposition(#[from] BundleError),

    /// Runtime data would be written inside the read-only bundle
    #[error("runtime data locations: {0}")]
    DataLocations(#[source] LauncherError),

    /// A target could not be signed even after fallback
    #[error("signing failed: {0}")]
    Signing(SigningError),

    /// The signed tree does not verify. Never retried.
    #[error("signature verification failed for {}: {reason}", path.display())]
    Verification {
        /// Bundle root
        path: PathBuf,
        /// Verifier output
        reason: String,
    },

    /// Disk image staging or creation failed
    #[error("packaging failed: {0}")]
    Packaging(#[from] PackageError),

    /// `release.json` could not be written
    #[error("writing release manifest: {0}")]
    Manifest(#[source] crate::bundler::Error),

    /// The packaged app did not come up healthy
    #[error("smoke test failed: {0}")]
    SmokeTest(#[from] LauncherError),

    /// A required external tool is not installed
    #[error("{stage}: {source}")]
    ToolUnavailable {
        /// Stage that needed it
        stage: Stage,
        /// Lookup failure
        #[source]
        source: crate::bundler::Error,
    },
}

impl From<SigningError> for ReleaseError {
    fn from(error: SigningError) -> Self {
        match error {
            SigningError::SignatureVerificationFailed { path, reason } => {
                ReleaseError::Verification { path, reason }
            }
            other => ReleaseError::Signing(other),
        }
    }
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Stage this error aborted, if it came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ReleaseError::Cli(_)
            | ReleaseError::Io(_)
            | ReleaseError::Config(_)
            | ReleaseError::Lock(_) => None,
            ReleaseError::Validation(_) => Some(Stage::Validate),
            ReleaseError::AssetGeneration(_) => Some(Stage::BuildIcon),
            ReleaseError::BundleComposition(_) | ReleaseError::DataLocations(_) => {
                Some(Stage::Bundle)
            }
            ReleaseError::Signing(_) | ReleaseError::Verification { .. } => Some(Stage::Sign),
            ReleaseError::Packaging(_) | ReleaseError::Manifest(_) => Some(Stage::Package),
            ReleaseError::SmokeTest(_) => Some(Stage::SmokeTest),
            ReleaseError::ToolUnavailable { stage, .. } => Some(*stage),
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Cli(_) => vec!["Run with --help to see valid usage".into()],
            ReleaseError::Io(_) => vec!["Check that stdout and stderr are writable".into()],
            ReleaseError::Config(_) => vec![
                "Check release.toml against the documented sections".into(),
                "Remove release.toml to fall back to the built-in defaults".into(),
            ],
            ReleaseError::Lock(_) => vec![
                "Wait for the other run to finish".into(),
                "If no other run is active, delete the stale .release.lock in the work directory"
                    .into(),
            ],
            ReleaseError::Validation(failure) => {
                let mut hints = failure.hints.clone();
                hints.push("Fix the inputs listed above, then re-run".into());
                hints
            }
            ReleaseError::AssetGeneration(error) => match error {
                IconError::NoRasterizerAvailable => vec![
                    "Install librsvg: brew install librsvg".into(),
                    "Or install ImageMagick: brew install imagemagick".into(),
                ],
                IconError::MissingSourceAsset { path } => {
                    vec![format!("Add the square vector icon at {}", path.display())]
                }
                _ => vec!["Check the icon source renders at every size, then re-run build-icon".into()],
            },
            ReleaseError::BundleComposition(error) => match error {
                BundleError::MissingDataSource { source_dir, .. }
                    if source_dir.ends_with("frontend/dist") =>
                {
                    vec!["Build the frontend first: (cd frontend && npm ci && npm run build)".into()]
                }
                BundleError::MissingDataSource { source_dir, .. } => vec![format!(
                    "Create {} or remove its [[bundle.data]] entry",
                    source_dir.display()
                )],
                BundleError::DuplicateDestination { .. } | BundleError::InvalidDestination { .. } => {
                    vec!["Give every [[bundle.data]] entry a unique relative dest".into()]
                }
                BundleError::FreezeFailed { .. } => vec![
                    "Install the freezer in the build environment: pip install pyinstaller".into(),
                    "Add missing dynamic imports to bundle.hidden_imports".into(),
                ],
                BundleError::NotABundle { .. } => {
                    vec!["Run the bundle command first to produce the .app".into()]
                }
                _ => vec!["Check the error message above for specific details".into()],
            },
            ReleaseError::DataLocations(LauncherError::NoHomeDirectory) => {
                vec!["Set HOME so ~/Library/Application Support can be resolved".into()]
            }
            ReleaseError::DataLocations(_) => vec![
                "Models, audio and the job database live under ~/Library/Application Support, never inside the .app"
                    .into(),
                "Check that HOME does not point inside the bundle".into(),
            ],
            ReleaseError::Signing(_) => vec![
                "List usable identities: security find-identity -v -p codesigning".into(),
                "Unset CODESIGN_IDENTITY to sign ad-hoc for local testing".into(),
            ],
            ReleaseError::Verification { .. } => vec![
                "Nothing may modify the bundle after signing; rebuild it with the release command"
                    .into(),
                "Inspect with: codesign --verify --deep --strict --verbose=4 <app>".into(),
            ],
            ReleaseError::Packaging(PackageError::StagingAssembly { path, .. }) => {
                vec![format!("Create {} before packaging", path.display())]
            }
            ReleaseError::Packaging(_) | ReleaseError::Manifest(_) => vec![
                "Eject any mounted volume with the same name and re-run package".into(),
                "Check free disk space in the dist directory".into(),
            ],
            ReleaseError::SmokeTest(_) => vec![
                "Run the app from a terminal to see backend output".into(),
                "Check ~/Library/Logs/HeartMuLa for the backend log".into(),
            ],
            ReleaseError::ToolUnavailable { .. } => vec![
                "Install the Xcode command line tools: xcode-select --install".into(),
                "Packaging and signing only run on macOS".into(),
            ],
        }
    }

    /// Check if this error is recoverable by fixing inputs and re-running
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ReleaseError::Verification { .. })
    }

    /// Process exit code: 2 for usage/configuration, 1 for stage failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReleaseError::Cli(_) | ReleaseError::Config(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failure_is_not_a_signing_failure() {
        let err: ReleaseError = SigningError::SignatureVerificationFailed {
            path: "/dist/HeartMuLa Studio.app".into(),
            reason: "invalid signature".into(),
        }
        .into();

        assert!(matches!(err, ReleaseError::Verification { .. }));
        assert_eq!(err.stage(), Some(Stage::Sign));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn validation_hints_are_carried() {
        let err = ReleaseError::from(ValidationFailure {
            failed: vec!["file launcher.py: not found".into()],
            hints: vec!["the launcher script is the bundle's entry point".into()],
        });

        assert_eq!(err.stage(), Some(Stage::Validate));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.recovery_suggestions()[0],
            "the launcher script is the bundle's entry point"
        );
    }

    #[test]
    fn missing_frontend_suggests_building_it() {
        let err = ReleaseError::from(BundleError::MissingDataSource {
            source_dir: "/p/frontend/dist".into(),
            dest: "frontend/dist".into(),
        });

        assert!(err.recovery_suggestions()[0].contains("npm run build"));
    }

    #[test]
    fn missing_rasterizer_names_both_backends() {
        let suggestions = ReleaseError::from(IconError::NoRasterizerAvailable).recovery_suggestions();

        assert!(suggestions.iter().any(|s| s.contains("librsvg")));
        assert!(suggestions.iter().any(|s| s.contains("imagemagick")));
    }
}
