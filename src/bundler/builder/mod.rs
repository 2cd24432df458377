//! Pipeline orchestration and the helpers every stage shares.
//!
//! - [`checksum`] - SHA-256 of the disk image and bundle tree
//! - [`orchestrator`] - [`ReleasePipeline`], one method per stage
//! - [`signing`] - signing identity resolution
//! - [`tool_detection`] - cached probes for external tools

pub mod checksum;
mod orchestrator;
mod signing;
pub mod tool_detection;

pub use orchestrator::{ReleaseManifest, ReleaseOutcome, ReleasePipeline, SigningSummary, Stage};
pub use signing::{SigningIdentity, SigningMode, resolve_identity};
