//! Release pipeline for the HeartMuLa Studio macOS app.
//!
//! Stages run strictly in order, each gating the next:
//!
//! 1. [`validation`] - pre-flight checks of every input
//! 2. [`icon`] - rasterize the vector icon and assemble the `.icns`
//! 3. [`platform::macos::app`] - freeze the entry point and materialize the `.app`
//! 4. [`platform::macos::sign`] - inside-out signing plus full-tree verification
//! 5. [`platform::macos::dmg`] - stage companions and build the disk image
//!
//! [`ReleasePipeline`] drives them from one immutable [`Settings`].

pub mod builder;
pub mod error;
pub mod icon;
pub mod platform;
pub mod settings;
pub mod utils;
pub mod validation;

pub use builder::{
    ReleaseManifest, ReleaseOutcome, ReleasePipeline, SigningIdentity, SigningMode, Stage,
    resolve_identity,
};
pub use error::{Context, Error, ErrorExt, Result};
pub use settings::{
    BundleSettings, ConfigError, DataMappingSettings, DmgSettings, MacOsSettings,
    PackageSettings, PathSettings, Settings, SettingsBuilder, SmokeSettings,
};
