//! `codesign` invocation.

use super::targets::{SigningTarget, TargetKind};
use crate::bundler::builder::tool_detection;
use crate::bundler::{
    SigningIdentity,
    error::{Error, Result},
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Options for one signing attempt.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub identity: &'a SigningIdentity,
    /// Hardened runtime plus secure timestamp.
    pub hardened: bool,
    /// Applied to executables and the root on hardened attempts.
    pub entitlements: Option<&'a Path>,
}

/// Signs and verifies code objects.
///
/// Implementations must be callable from several worker threads at once.
pub trait CodeSigner: Send + Sync {
    fn sign(&self, target: &SigningTarget, request: &SignRequest<'_>) -> Result<()>;

    /// Deep, strict verification of the whole bundle.
    fn verify(&self, bundle_root: &Path) -> Result<()>;
}

/// Apple's `codesign` tool.
#[derive(Debug, Clone)]
pub struct CodesignTool {
    program: PathBuf,
}

impl CodesignTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Finds `codesign` on PATH.
    pub fn locate() -> Result<Self> {
        tool_detection::require("codesign", "install the Xcode command line tools (xcode-select --install)")
            .map(Self::new)
    }

    pub(crate) fn sign_args(target: &SigningTarget, request: &SignRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--force".into(),
            "--sign".into(),
            request.identity.identifier.clone().into(),
        ];

        if request.hardened {
            args.extend(["--options", "runtime", "--timestamp"].map(OsString::from));
            let wants_entitlements =
                matches!(target.kind, TargetKind::Executable | TargetKind::BundleRoot);
            if let (true, Some(entitlements)) = (wants_entitlements, request.entitlements) {
                args.push("--entitlements".into());
                args.push(entitlements.into());
            }
        } else {
            args.push("--timestamp=none".into());
        }

        args.push(target.path.clone().into());
        args
    }

    fn run(&self, args: &[OsString]) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(args);
        log::debug!("Running {:?}", command);

        let output = command.output().map_err(|e| Error::ToolFailed {
            tool: "codesign".into(),
            reason: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(Error::ToolFailed {
                tool: "codesign".into(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl CodeSigner for CodesignTool {
    fn sign(&self, target: &SigningTarget, request: &SignRequest<'_>) -> Result<()> {
        self.run(&Self::sign_args(target, request))
    }

    fn verify(&self, bundle_root: &Path) -> Result<()> {
        self.run(&[
            "--verify".into(),
            "--deep".into(),
            "--strict".into(),
            "--verbose=2".into(),
            bundle_root.into(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn target(kind: TargetKind) -> SigningTarget {
        SigningTarget {
            path: "/dist/Demo.app".into(),
            kind,
            depth: 0,
        }
    }

    #[test]
    fn hardened_attempt_adds_runtime_timestamp_and_entitlements() {
        let identity = SigningIdentity::certificate("Developer ID Application: Example (ABCDE12345)");
        let request = SignRequest {
            identity: &identity,
            hardened: true,
            entitlements: Some(Path::new("/p/entitlements.plist")),
        };

        let args = strings(CodesignTool::sign_args(&target(TargetKind::BundleRoot), &request));

        assert_eq!(
            args,
            [
                "--force",
                "--sign",
                "Developer ID Application: Example (ABCDE12345)",
                "--options",
                "runtime",
                "--timestamp",
                "--entitlements",
                "/p/entitlements.plist",
                "/dist/Demo.app",
            ]
        );
    }

    #[test]
    fn libraries_never_get_entitlements() {
        let identity = SigningIdentity::certificate("ABC");
        let request = SignRequest {
            identity: &identity,
            hardened: true,
            entitlements: Some(Path::new("/p/entitlements.plist")),
        };

        let args = strings(CodesignTool::sign_args(&target(TargetKind::Library), &request));

        assert!(!args.contains(&"--entitlements".to_string()));
    }

    #[test]
    fn plain_attempt_disables_timestamp() {
        let identity = SigningIdentity::ad_hoc();
        let request = SignRequest {
            identity: &identity,
            hardened: false,
            entitlements: None,
        };

        let args = strings(CodesignTool::sign_args(&target(TargetKind::Executable), &request));

        assert_eq!(args, ["--force", "--sign", "-", "--timestamp=none", "/dist/Demo.app"]);
    }
}
