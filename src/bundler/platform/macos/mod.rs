//! macOS bundle, signing and disk image stages.
//!
//! - [`app`] - bundle manifest and `.app` materialization
//! - [`imports`] - entry point import graph
//! - [`freeze`] - interpreter freezing (PyInstaller)
//! - [`sign`] - inside-out signing and verification
//! - [`dmg`] - disk image packaging
//! - [`launcher`] - runtime environment contract and smoke test

pub mod app;
pub mod dmg;
pub mod freeze;
pub mod imports;
pub mod launcher;
pub mod sign;
