//! One pipeline run per work directory.
//!
//! An advisory `flock` on `<work_dir>/.release.lock` is held for the whole
//! run and released when the guard drops (or the process dies).

use crate::bundler::error::{Error, ErrorExt, Result};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".release.lock";

/// Held for the duration of a run.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<std::fs::File>,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Takes the run lock without blocking.
///
/// Fails when another run already owns `work_dir`.
pub fn acquire(work_dir: &Path) -> Result<RunLock> {
    std::fs::create_dir_all(work_dir).fs_context("creating work directory", work_dir)?;
    let path = work_dir.join(LOCK_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .fs_context("opening lock file", &path)?;

    #[cfg(unix)]
    {
        use nix::fcntl::{Flock, FlockArg};
        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            Error::GenericError(format!(
                "another release run holds {} ({})",
                path.display(),
                errno
            ))
        })?;
        log::debug!("Acquired run lock {}", path.display());
        Ok(RunLock { path, _lock: lock })
    }

    #[cfg(not(unix))]
    {
        drop(file);
        Ok(RunLock { path })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn second_run_is_refused_until_first_ends() {
        let tmp = tempfile::tempdir().unwrap();

        let first = acquire(tmp.path()).unwrap();
        let err = acquire(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("another release run"));

        drop(first);
        assert!(acquire(tmp.path()).is_ok());
    }
}
