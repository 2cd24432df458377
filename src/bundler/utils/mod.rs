//! Shared filesystem helpers.

pub mod fs;
pub mod lock;
