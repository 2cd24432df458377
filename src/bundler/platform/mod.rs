//! Platform-specific stages.

pub mod macos;
