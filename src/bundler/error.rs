//! Low-level error type shared by the bundler stages.
//!
//! Stage modules wrap this in their own error enums; filesystem failures carry
//! the operation and path through [`ErrorExt::fs_context`].

use std::{fmt::Display, path::PathBuf};

/// Result alias for low-level bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by filesystem, tool and format helpers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem operation failed on a specific path.
    #[error("{context} {path}: {error}")]
    Fs {
        /// What was being attempted
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        error: std::io::Error,
    },

    /// External tool failed.
    #[error("`{tool}` failed: {reason}")]
    ToolFailed {
        /// Tool name
        tool: String,
        /// stderr or spawn error
        reason: String,
    },

    /// Free-form error.
    #[error("{0}")]
    GenericError(String),

    /// IO error without path information.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Directory traversal error.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    /// Path prefix error.
    #[error(transparent)]
    StripPrefix(#[from] std::path::StripPrefixError),

    /// Image decoding error.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Property list error.
    #[error(transparent)]
    Plist(#[from] plist::Error),

    /// JSON error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Invalid regular expression.
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// Attach a message to an error or a missing value.
pub trait Context<T> {
    /// Wrap the error with a fixed message.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Wrap the error with a lazily built message.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::GenericError(format!("{context}: {e}")))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::GenericError(format!("{}: {e}", f())))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Attach filesystem context (operation + path) to IO results.
pub trait ErrorExt<T> {
    /// Convert an IO error into [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Return early with a [`Error::GenericError`].
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError(format!($msg)).into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)).into())
    };
}
