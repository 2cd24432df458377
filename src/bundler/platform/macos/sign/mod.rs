//! Inside-out code signing.
//!
//! 1. Discover every signable object and plan the order ([`SigningPlan`]).
//! 2. Sign level by level, deepest first. Targets within one level are
//!    independent and are spread over worker threads; every worker joins
//!    before the next level starts.
//! 3. Sign the bundle root.
//! 4. Verify the whole tree. Only then is a [`SignedBundle`] produced.
//!
//! Certificate identities try hardened runtime + timestamp first and fall
//! back to a plain signature of the same target with a warning. Ad-hoc
//! identities never attempt the hardened options.

mod codesign;
mod targets;

use super::app::AppBundle;
use crate::bundler::SigningIdentity;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub use codesign::{CodeSigner, CodesignTool, SignRequest};
pub use targets::{SigningPlan, SigningTarget, TargetKind, discover, is_mach_o};

/// Signing stage failures.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The bundle could not be walked.
    #[error("failed to enumerate signing targets: {0}")]
    Discovery(#[source] crate::bundler::Error),

    /// The plain (or only) signing attempt failed.
    #[error("signing {} ({kind:?}) failed: {reason}", path.display())]
    TargetFailed {
        /// Target path
        path: PathBuf,
        /// Target kind
        kind: TargetKind,
        /// Tool output
        reason: String,
    },

    /// A signing worker panicked.
    #[error("signing worker for depth {depth} panicked")]
    WorkerPanicked {
        /// Level being signed
        depth: usize,
    },

    /// The signed tree does not verify.
    #[error("signature verification failed for {}: {reason}", path.display())]
    SignatureVerificationFailed {
        /// Bundle root
        path: PathBuf,
        /// Verifier output
        reason: String,
    },
}

/// Why a hardened attempt was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Timestamp server unreachable or refused the request.
    TimestampUnavailable,
    /// The target cannot carry hardened runtime flags or entitlements.
    HardenedRuntimeUnsupported,
    Other,
}

impl FallbackReason {
    /// Classifies signing tool output.
    pub fn classify(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        if message.contains("timestamp") {
            Self::TimestampUnavailable
        } else if ["runtime", "hardened", "entitlement", "not supported", "unsupported"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            Self::HardenedRuntimeUnsupported
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TimestampUnavailable => "timestamp service unavailable",
            Self::HardenedRuntimeUnsupported => "hardened runtime unsupported",
            Self::Other => "hardened signing failed",
        })
    }
}

/// A target that fell back to a plain signature.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackWarning {
    pub path: PathBuf,
    pub reason: FallbackReason,
    /// Tool output of the failed hardened attempt.
    pub detail: String,
}

impl fmt::Display for FallbackWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}, signed without hardened runtime ({})",
            self.path.display(),
            self.reason,
            self.detail
        )
    }
}

/// One completed signature.
#[derive(Debug, Clone, Serialize)]
pub struct SignedTarget {
    #[serde(flatten)]
    pub target: SigningTarget,
    pub hardened: bool,
}

/// What the signing stage did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SigningReport {
    /// In signing order, level by level.
    pub signed: Vec<SignedTarget>,
    pub warnings: Vec<FallbackWarning>,
}

/// A bundle whose full-tree verification passed.
///
/// Only [`Signer::sign`] and [`Signer::verify_existing`] create one.
#[derive(Debug)]
pub struct SignedBundle {
    bundle: AppBundle,
    report: SigningReport,
}

impl SignedBundle {
    pub fn bundle(&self) -> &AppBundle {
        &self.bundle
    }

    pub fn report(&self) -> &SigningReport {
        &self.report
    }
}

type TargetOutcome = Result<(SignedTarget, Option<FallbackWarning>), SigningError>;

/// Drives a [`CodeSigner`] over a bundle.
pub struct Signer<'a> {
    tool: &'a dyn CodeSigner,
    jobs: usize,
    entitlements: Option<PathBuf>,
}

impl<'a> Signer<'a> {
    /// `jobs` bounds the worker threads per depth level.
    pub fn new(tool: &'a dyn CodeSigner, jobs: usize) -> Self {
        Self {
            tool,
            jobs: jobs.max(1),
            entitlements: None,
        }
    }

    pub fn with_entitlements(mut self, entitlements: Option<PathBuf>) -> Self {
        self.entitlements = entitlements;
        self
    }

    /// Signs every target inside-out, then verifies the tree.
    pub fn sign(
        &self,
        bundle: AppBundle,
        identity: &SigningIdentity,
    ) -> Result<SignedBundle, SigningError> {
        let plan = SigningPlan::for_bundle(&bundle).map_err(SigningError::Discovery)?;
        log::info!(
            "Signing {} targets in {} levels with {} identity",
            plan.len(),
            plan.levels().len() + 1,
            identity
        );

        let mut report = SigningReport::default();
        for (depth, level) in plan.levels() {
            log::debug!("Depth {}: {} targets", depth, level.len());
            for outcome in self.sign_level(*depth, level, identity)? {
                record(&mut report, outcome);
            }
        }
        record(&mut report, self.sign_one(plan.root(), identity)?);

        self.verify(bundle.root())?;
        log::info!(
            "✓ Signed and verified {} ({} fallback warnings)",
            bundle.root().display(),
            report.warnings.len()
        );
        Ok(SignedBundle { bundle, report })
    }

    /// Verifies a bundle signed by an earlier run without re-signing it.
    pub fn verify_existing(&self, bundle: AppBundle) -> Result<SignedBundle, SigningError> {
        self.verify(bundle.root())?;
        log::info!("✓ Existing signature verified: {}", bundle.root().display());
        Ok(SignedBundle {
            bundle,
            report: SigningReport::default(),
        })
    }

    fn verify(&self, root: &Path) -> Result<(), SigningError> {
        self.tool
            .verify(root)
            .map_err(|e| SigningError::SignatureVerificationFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Signs one level; returns only after every worker has finished.
    fn sign_level(
        &self,
        depth: usize,
        level: &[SigningTarget],
        identity: &SigningIdentity,
    ) -> Result<Vec<(SignedTarget, Option<FallbackWarning>)>, SigningError> {
        let sign_chunk = |chunk: &[SigningTarget]| -> Vec<TargetOutcome> {
            let mut outcomes = Vec::with_capacity(chunk.len());
            for target in chunk {
                let outcome = self.sign_one(target, identity);
                let failed = outcome.is_err();
                outcomes.push(outcome);
                if failed {
                    break;
                }
            }
            outcomes
        };

        let results: Vec<TargetOutcome> = if self.jobs == 1 || level.len() == 1 {
            sign_chunk(level)
        } else {
            let chunk_size = level.len().div_ceil(self.jobs);
            std::thread::scope(|scope| {
                let workers: Vec<_> = level
                    .chunks(chunk_size)
                    .map(|chunk| scope.spawn(move || sign_chunk(chunk)))
                    .collect();
                workers
                    .into_iter()
                    .flat_map(|worker| {
                        worker
                            .join()
                            .unwrap_or_else(|_| vec![Err(SigningError::WorkerPanicked { depth })])
                    })
                    .collect()
            })
        };

        results.into_iter().collect()
    }

    fn sign_one(&self, target: &SigningTarget, identity: &SigningIdentity) -> TargetOutcome {
        let mut fallback = None;

        if identity.allows_hardened() {
            let hardened = SignRequest {
                identity,
                hardened: true,
                entitlements: self.entitlements.as_deref(),
            };
            match self.tool.sign(target, &hardened) {
                Ok(()) => {
                    log::debug!("Signed (hardened) {}", target.path.display());
                    return Ok((
                        SignedTarget {
                            target: target.clone(),
                            hardened: true,
                        },
                        None,
                    ));
                }
                Err(e) => {
                    let detail = e.to_string();
                    let warning = FallbackWarning {
                        path: target.path.clone(),
                        reason: FallbackReason::classify(&detail),
                        detail,
                    };
                    log::warn!("{}", warning);
                    fallback = Some(warning);
                }
            }
        }

        let plain = SignRequest {
            identity,
            hardened: false,
            entitlements: None,
        };
        self.tool
            .sign(target, &plain)
            .map_err(|e| SigningError::TargetFailed {
                path: target.path.clone(),
                kind: target.kind,
                reason: e.to_string(),
            })?;
        log::debug!("Signed {}", target.path.display());

        Ok((
            SignedTarget {
                target: target.clone(),
                hardened: false,
            },
            fallback,
        ))
    }
}

fn record(report: &mut SigningReport, (signed, warning): (SignedTarget, Option<FallbackWarning>)) {
    report.signed.push(signed);
    report.warnings.extend(warning);
}
