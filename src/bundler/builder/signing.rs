//! Signing identity resolution.
//!
//! The identity is read once at startup (from `--identity` or the
//! `CODESIGN_IDENTITY` environment variable) and carried in
//! [`Settings`](crate::bundler::Settings) for the rest of the run.

use serde::Serialize;
use std::fmt;

/// Spellings accepted for an ad-hoc identity.
const AD_HOC_ALIASES: &[&str] = &["-", "ad-hoc", "adhoc", "ad_hoc"];

/// How the bundle is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningMode {
    /// Local signature without a trust chain. Never hardened or timestamped.
    AdHoc,
    /// Certificate-backed identity from the keychain.
    Certificate,
}

/// Identity passed to the signing tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningIdentity {
    /// Ad-hoc or certificate.
    pub mode: SigningMode,
    /// Value handed to `codesign --sign` (`-` for ad-hoc).
    pub identifier: String,
}

impl SigningIdentity {
    /// The ad-hoc identity (`-`).
    pub fn ad_hoc() -> Self {
        Self {
            mode: SigningMode::AdHoc,
            identifier: "-".into(),
        }
    }

    /// A certificate identity, e.g. `Developer ID Application: Name (TEAMID)`
    /// or a SHA-1 fingerprint.
    pub fn certificate(identifier: impl Into<String>) -> Self {
        Self {
            mode: SigningMode::Certificate,
            identifier: identifier.into(),
        }
    }

    /// Parses a CLI/environment value. Empty and `ad-hoc` spellings select ad-hoc.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || AD_HOC_ALIASES.contains(&value.to_ascii_lowercase().as_str()) {
            Self::ad_hoc()
        } else {
            Self::certificate(value)
        }
    }

    /// Returns true when hardened runtime + timestamp may be attempted.
    pub fn allows_hardened(&self) -> bool {
        self.mode == SigningMode::Certificate
    }
}

impl fmt::Display for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            SigningMode::AdHoc => f.write_str("ad-hoc"),
            SigningMode::Certificate => write!(f, "certificate \"{}\"", self.identifier),
        }
    }
}

/// Resolve the identity for this run from the CLI/environment value.
pub fn resolve_identity(value: Option<&str>) -> SigningIdentity {
    let identity = value.map(SigningIdentity::parse).unwrap_or_else(SigningIdentity::ad_hoc);
    match identity.mode {
        SigningMode::AdHoc => {
            log::info!("Using ad-hoc signing identity (set CODESIGN_IDENTITY for a certificate)")
        }
        SigningMode::Certificate => log::info!("Using signing identity: {}", identity.identifier),
    }
    identity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_hoc_spellings() {
        for value in ["-", "ad-hoc", "AD-HOC", "adhoc", "  ", ""] {
            assert_eq!(SigningIdentity::parse(value), SigningIdentity::ad_hoc(), "{value:?}");
        }
    }

    #[test]
    fn anything_else_is_a_certificate() {
        let identity = SigningIdentity::parse("Developer ID Application: Example (ABCDE12345)");
        assert_eq!(identity.mode, SigningMode::Certificate);
        assert!(identity.allows_hardened());
        assert!(!SigningIdentity::ad_hoc().allows_hardened());
    }

    #[test]
    fn missing_value_defaults_to_ad_hoc() {
        assert_eq!(resolve_identity(None).mode, SigningMode::AdHoc);
    }
}
