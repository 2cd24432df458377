//! Release pipeline for the HeartMuLa Studio macOS app.
//!
//! This library turns a Python backend, a built web frontend and a vector icon
//! into a signed, verified disk image:
//! - pre-flight validation of every input
//! - `.icns` generation from the vector icon
//! - a frozen `.app` bundle with data directories and placeholders
//! - inside-out code signing with hardened-runtime fallback
//! - a drag-to-install `.dmg` with checksum and release manifest
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;

// Re-export commonly used types
pub use error::{CliError, ReleaseError, Result};
