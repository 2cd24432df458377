//! Signing target discovery and ordering.
//!
//! Discovery is a pure walk of the bundle: nothing is signed here. The plan
//! it produces groups targets by depth, deepest first, with the bundle root
//! held back so it is always signed last.

use crate::bundler::error::{Context, Result};
use crate::bundler::platform::macos::app::AppBundle;
use goblin::mach::{fat, header};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Directory extensions that are signed as a unit.
const CONTAINER_EXTENSIONS: &[&str] = &["framework", "app", "bundle", "plugin", "xpc", "appex"];

/// Shared library extensions.
const LIBRARY_EXTENSIONS: &[&str] = &["dylib", "so"];

/// What a signing target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// `.dylib` / `.so`.
    Library,
    /// Nested container: framework, helper app, plugin, XPC service.
    Framework,
    /// Any other Mach-O file.
    Executable,
    /// The `.app` itself.
    BundleRoot,
}

/// One object to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningTarget {
    pub path: PathBuf,
    pub kind: TargetKind,
    /// Container boundaries enclosing the object; 0 only for the root.
    pub depth: usize,
}

fn has_extension(path: &Path, set: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| set.iter().any(|s| s.eq_ignore_ascii_case(e)))
}

fn is_container(path: &Path) -> bool {
    has_extension(path, CONTAINER_EXTENSIONS)
}

/// True when the file starts with a thin or fat Mach-O magic number.
pub fn is_mach_o(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    if file.read_exact(&mut magic).is_err() {
        return false;
    }
    let magic = u32::from_be_bytes(magic);
    [
        header::MH_MAGIC,
        header::MH_CIGAM,
        header::MH_MAGIC_64,
        header::MH_CIGAM_64,
        fat::FAT_MAGIC,
        fat::FAT_CIGAM,
    ]
    .contains(&magic)
}

/// Depth of an object at `rel` (relative to the bundle root): one for the
/// root plus one per enclosing nested container.
fn depth_of(rel: &Path) -> usize {
    let enclosing = rel
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter(|c| is_container(Path::new(c.as_os_str())))
                .count()
        })
        .unwrap_or(0);
    1 + enclosing
}

/// Enumerates every signable object under the bundle, including the root.
///
/// Symlinks are neither followed nor signed.
pub fn discover(bundle: &AppBundle) -> Result<Vec<SigningTarget>> {
    let root = bundle.root();
    let mut targets = Vec::new();

    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            continue;
        }

        let path = entry.path();
        let rel = path.strip_prefix(root)?;
        let kind = if file_type.is_dir() {
            if !is_container(path) {
                continue;
            }
            TargetKind::Framework
        } else if has_extension(path, LIBRARY_EXTENSIONS) {
            TargetKind::Library
        } else if is_mach_o(path) {
            TargetKind::Executable
        } else {
            continue;
        };

        targets.push(SigningTarget {
            path: path.to_path_buf(),
            kind,
            depth: depth_of(rel),
        });
    }

    targets.push(SigningTarget {
        path: root.to_path_buf(),
        kind: TargetKind::BundleRoot,
        depth: 0,
    });
    Ok(targets)
}

/// Ordered signing plan.
#[derive(Debug, Clone)]
pub struct SigningPlan {
    levels: Vec<(usize, Vec<SigningTarget>)>,
    root: SigningTarget,
}

impl SigningPlan {
    /// Groups targets by depth, deepest level first, paths sorted within a
    /// level. The bundle root is separated out whatever depth it carries.
    pub fn new(targets: Vec<SigningTarget>, root: &Path) -> Result<Self> {
        let mut by_depth: BTreeMap<usize, Vec<SigningTarget>> = BTreeMap::new();
        let mut root_target = None;

        for target in targets {
            if target.kind == TargetKind::BundleRoot || target.path == root {
                root_target = Some(SigningTarget {
                    kind: TargetKind::BundleRoot,
                    depth: 0,
                    ..target
                });
            } else {
                by_depth.entry(target.depth).or_default().push(target);
            }
        }

        let root = root_target.with_context(|| {
            format!("bundle root {} missing from signing targets", root.display())
        })?;

        let levels = by_depth
            .into_iter()
            .rev()
            .map(|(depth, mut level)| {
                level.sort_by(|a, b| a.path.cmp(&b.path));
                (depth, level)
            })
            .collect();

        Ok(Self { levels, root })
    }

    /// Discovers and plans in one step.
    pub fn for_bundle(bundle: &AppBundle) -> Result<Self> {
        Self::new(discover(bundle)?, bundle.root())
    }

    /// `(depth, targets)` levels, deepest first. Excludes the root.
    pub fn levels(&self) -> &[(usize, Vec<SigningTarget>)] {
        &self.levels
    }

    pub fn root(&self) -> &SigningTarget {
        &self.root
    }

    /// Number of targets including the root.
    pub fn len(&self) -> usize {
        self.levels.iter().map(|(_, l)| l.len()).sum::<usize>() + 1
    }

    /// A plan always holds at least the root.
    pub fn is_empty(&self) -> bool {
        false
    }
}
