//! SHA-256 digests for release artifacts.
//!
//! Files are hashed directly; directory trees (the `.app`) are hashed over
//! their sorted relative paths and contents so the digest is stable across
//! runs on identical input.

use crate::bail;
use crate::bundler::error::{ErrorExt, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Hex SHA-256 of a file or directory tree.
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading metadata", path)?;

    if metadata.is_file() {
        let mut hasher = Sha256::new();
        hash_file_into(path, &mut hasher).await?;
        Ok(format!("{:x}", hasher.finalize()))
    } else if metadata.is_dir() {
        calculate_directory_sha256(path).await
    } else {
        bail!("Path is neither file nor directory: {}", path.display())
    }
}

async fn hash_file_into(file_path: &Path, hasher: &mut Sha256) -> Result<()> {
    let mut file = tokio::fs::File::open(file_path)
        .await
        .fs_context("opening file for hashing", file_path)?;
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hash calculation", file_path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(())
}

/// Symlinks contribute their target path, not the target's contents.
async fn calculate_directory_sha256(dir_path: &Path) -> Result<String> {
    let mut entries: Vec<walkdir::DirEntry> = walkdir::WalkDir::new(dir_path)
        .follow_links(false)
        .into_iter()
        .collect::<std::result::Result<_, _>>()?;
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    let mut hasher = Sha256::new();
    for entry in entries {
        let rel_path = entry.path().strip_prefix(dir_path)?;
        if entry.file_type().is_symlink() {
            hasher.update(rel_path.to_string_lossy().as_bytes());
            let target = std::fs::read_link(entry.path()).fs_context("reading link", entry.path())?;
            hasher.update(target.to_string_lossy().as_bytes());
        } else if entry.file_type().is_file() {
            hasher.update(rel_path.to_string_lossy().as_bytes());
            hash_file_into(entry.path(), &mut hasher).await?;
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Writes `<artifact>.sha256` in `shasum -a 256` format.
pub async fn write_checksum_file(artifact: &Path, checksum: &str) -> Result<PathBuf> {
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut sidecar = artifact.as_os_str().to_owned();
    sidecar.push(".sha256");
    let sidecar = PathBuf::from(sidecar);

    tokio::fs::write(&sidecar, format!("{}  {}\n", checksum, file_name))
        .await
        .fs_context("writing checksum file", &sidecar)?;
    Ok(sidecar)
}
