//! Configuration structures for the release pipeline.
//!
//! Environment variables and CLI flags are read once at startup and folded,
//! together with `release.toml`, into one immutable [`Settings`] value.

mod builder;
mod bundle;
mod core;
mod file;
mod macos;
mod package;
mod paths;

// Re-export all public types
pub use builder::SettingsBuilder;
pub use bundle::{BundleSettings, DataMappingSettings};
pub use core::Settings;
pub use file::{ConfigError, DEFAULT_CONFIG_FILE, ReleaseFile, ValidationSection};
pub use macos::{DmgSettings, MacOsSettings, SmokeSettings};
pub use package::PackageSettings;
pub use paths::PathSettings;
