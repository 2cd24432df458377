//! `.app` materialization.
//!
//! A [`BundleManifest`] is resolved once from [`Settings`], checked in full,
//! and only then written out: a missing data source or a colliding
//! destination never leaves a half-built bundle on disk.
//!
//! Resulting layout:
//!
//! ```text
//! HeartMuLa Studio.app/
//! └── Contents/
//!     ├── Info.plist
//!     ├── MacOS/            frozen onedir tree (executable + runtime)
//!     └── Resources/
//!         ├── HeartMuLa.icns
//!         ├── frontend/dist/
//!         ├── backend/
//!         ├── models/           (empty placeholder)
//!         ├── generated_audio/  (empty placeholder)
//!         └── ref_audio/        (empty placeholder)
//! ```

use super::freeze::{FreezeRequest, Freezer};
use super::imports;
use crate::bundler::{
    error::{Error, ErrorExt},
    settings::Settings,
    utils::fs,
};
use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};

/// Bundle composition failures.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Entry point script does not exist.
    #[error("entry point not found: {}", path.display())]
    MissingEntryPoint {
        /// Expected script
        path: PathBuf,
    },

    /// A mapped source directory does not exist.
    #[error("data source {} (for {}) does not exist", source_dir.display(), dest.display())]
    MissingDataSource {
        /// Missing directory
        source_dir: PathBuf,
        /// Where it would have gone
        dest: PathBuf,
    },

    /// Two mappings target the same path.
    #[error("two data mappings target {}", dest.display())]
    DuplicateDestination {
        /// Colliding bundle-relative path
        dest: PathBuf,
    },

    /// Destination is absolute or escapes the bundle.
    #[error("data mapping destination {} must be a relative path inside the bundle", dest.display())]
    InvalidDestination {
        /// Offending path
        dest: PathBuf,
    },

    /// The freezer failed or produced no executable.
    #[error("{freezer} failed: {reason}")]
    FreezeFailed {
        /// Freezer name
        freezer: String,
        /// What went wrong
        reason: String,
    },

    /// Path is not a readable `.app`.
    #[error("{} is not an application bundle: {reason}", path.display())]
    NotABundle {
        /// Inspected path
        path: PathBuf,
        /// What is missing
        reason: String,
    },

    /// Filesystem error while writing the bundle.
    #[error(transparent)]
    Bundler(#[from] Error),
}

/// One directory copied into `Contents/Resources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMapping {
    /// Absolute source directory.
    pub source: PathBuf,
    /// Path relative to `Contents/Resources`.
    pub dest: PathBuf,
    /// Create the directory only; never copy contents.
    pub placeholder: bool,
}

/// Everything that goes into the bundle, resolved once.
#[derive(Debug, Clone)]
pub struct BundleManifest {
    entry_point: PathBuf,
    data_mappings: Vec<DataMapping>,
    hidden_imports: BTreeSet<String>,
    packages: Vec<String>,
}

impl BundleManifest {
    /// Validates destinations: each must be unique and stay inside the bundle.
    pub fn new(
        entry_point: PathBuf,
        data_mappings: Vec<DataMapping>,
        hidden_imports: BTreeSet<String>,
        packages: Vec<String>,
    ) -> Result<Self, BundleError> {
        let mut seen = HashSet::new();
        for mapping in &data_mappings {
            if !fs::is_contained_relative(&mapping.dest) {
                return Err(BundleError::InvalidDestination {
                    dest: mapping.dest.clone(),
                });
            }
            let normalized: PathBuf = mapping
                .dest
                .components()
                .filter(|c| !matches!(c, Component::CurDir))
                .collect();
            if !seen.insert(normalized) {
                return Err(BundleError::DuplicateDestination {
                    dest: mapping.dest.clone(),
                });
            }
        }

        Ok(Self {
            entry_point,
            data_mappings,
            hidden_imports,
            packages,
        })
    }

    /// Builds the manifest from `[bundle]` settings.
    ///
    /// Placeholders map `<root>/<name>` to `<name>` and are always present.
    pub fn from_settings(settings: &Settings) -> Result<Self, BundleError> {
        let bundle = settings.bundle_settings();
        let mut mappings: Vec<DataMapping> = bundle
            .data
            .iter()
            .map(|m| DataMapping {
                source: settings.resolve(&m.source),
                dest: m.dest.clone(),
                placeholder: false,
            })
            .collect();
        mappings.extend(bundle.placeholders.iter().map(|p| DataMapping {
            source: settings.resolve(p),
            dest: p.clone(),
            placeholder: true,
        }));

        Self::new(
            settings.entry_point(),
            mappings,
            bundle.hidden_imports.iter().cloned().collect(),
            bundle.packages.clone(),
        )
    }

    /// Unions the entry point's local import graph into the hidden imports.
    ///
    /// Returns how many modules were added.
    pub fn resolve_imports(&mut self, root: &Path) -> Result<usize, BundleError> {
        self.check_entry_point()?;
        let graph = imports::scan(&self.entry_point, root)?;
        let before = self.hidden_imports.len();
        self.hidden_imports.extend(graph.local_modules());
        log::debug!(
            "Import graph: {} modules, external roots: {:?}",
            graph.module_count(),
            graph.external_roots()
        );
        Ok(self.hidden_imports.len() - before)
    }

    fn check_entry_point(&self) -> Result<(), BundleError> {
        if self.entry_point.is_file() {
            Ok(())
        } else {
            Err(BundleError::MissingEntryPoint {
                path: self.entry_point.clone(),
            })
        }
    }

    /// Fails on the first non-placeholder mapping whose source is missing.
    pub fn check_sources(&self) -> Result<(), BundleError> {
        self.check_entry_point()?;
        for mapping in self.data_mappings.iter().filter(|m| !m.placeholder) {
            if !mapping.source.is_dir() {
                return Err(BundleError::MissingDataSource {
                    source_dir: mapping.source.clone(),
                    dest: mapping.dest.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn entry_point(&self) -> &Path {
        &self.entry_point
    }

    pub fn data_mappings(&self) -> &[DataMapping] {
        &self.data_mappings
    }

    pub fn hidden_imports(&self) -> &BTreeSet<String> {
        &self.hidden_imports
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }
}

/// A materialized `.app` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppBundle {
    root: PathBuf,
    executable: String,
}

impl AppBundle {
    /// Reopens a bundle written by a previous run.
    pub fn open(root: &Path) -> Result<Self, BundleError> {
        let not_a_bundle = |reason: &str| BundleError::NotABundle {
            path: root.to_path_buf(),
            reason: reason.to_string(),
        };
        if !root.is_dir() {
            return Err(not_a_bundle("directory does not exist"));
        }

        let info = root.join("Contents/Info.plist");
        let value = plist::Value::from_file(&info)
            .map_err(|e| not_a_bundle(&format!("unreadable Info.plist: {e}")))?;
        let executable = value
            .as_dictionary()
            .and_then(|d| d.get("CFBundleExecutable"))
            .and_then(plist::Value::as_string)
            .ok_or_else(|| not_a_bundle("Info.plist has no CFBundleExecutable"))?
            .to_string();

        let bundle = Self {
            root: root.to_path_buf(),
            executable,
        };
        if !bundle.executable_path().is_file() {
            return Err(not_a_bundle("executable is missing"));
        }
        Ok(bundle)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contents_dir(&self) -> PathBuf {
        self.root.join("Contents")
    }

    pub fn macos_dir(&self) -> PathBuf {
        self.contents_dir().join("MacOS")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.contents_dir().join("Resources")
    }

    pub fn info_plist(&self) -> PathBuf {
        self.contents_dir().join("Info.plist")
    }

    pub fn executable_name(&self) -> &str {
        &self.executable
    }

    pub fn executable_path(&self) -> PathBuf {
        self.macos_dir().join(&self.executable)
    }
}

/// Freezes the entry point and writes the `.app` at
/// [`Settings::app_bundle_path`].
///
/// Sources are checked before the freezer runs or anything is written.
pub async fn materialize(
    manifest: &BundleManifest,
    freezer: &dyn Freezer,
    settings: &Settings,
) -> Result<AppBundle, BundleError> {
    manifest.check_sources()?;

    let work_dir = settings.work_dir();
    let freeze_dist = work_dir.join("frozen");
    fs::create_dir_all(&freeze_dist, true).await?;

    let hooks_dir = settings.hooks_dir();
    let request = FreezeRequest {
        name: settings.executable_name(),
        entry_point: manifest.entry_point(),
        hidden_imports: manifest.hidden_imports(),
        collect_all: manifest.packages(),
        hooks_dir: hooks_dir.is_dir().then_some(hooks_dir.as_path()),
        work_dir: &work_dir,
        dist_dir: &freeze_dist,
    };
    let frozen = freezer
        .freeze(&request)
        .map_err(|e| BundleError::FreezeFailed {
            freezer: freezer.name().to_string(),
            reason: e.to_string(),
        })?;
    if !frozen.join(settings.executable_name()).is_file() {
        return Err(BundleError::FreezeFailed {
            freezer: freezer.name().to_string(),
            reason: format!(
                "no executable `{}` in {}",
                settings.executable_name(),
                frozen.display()
            ),
        });
    }

    let bundle = AppBundle {
        root: settings.app_bundle_path(),
        executable: settings.executable_name().to_string(),
    };
    log::info!("Materializing {}", bundle.root().display());
    fs::create_dir_all(bundle.root(), true).await?;
    fs::copy_dir(&frozen, &bundle.macos_dir()).await?;
    fs::create_dir_all(&bundle.resources_dir(), false).await?;

    for mapping in manifest.data_mappings() {
        let dest = bundle.resources_dir().join(&mapping.dest);
        if mapping.placeholder {
            log::debug!("Placeholder {}", mapping.dest.display());
            fs::create_dir_all(&dest, false).await?;
        } else {
            log::debug!("Copying {} -> {}", mapping.source.display(), dest.display());
            fs::copy_dir(&mapping.source, &dest).await?;
        }
    }

    let icon = settings.icon_output();
    let icon_file = if icon.is_file() {
        let name = icon
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "icon.icns".into());
        fs::copy_file(&icon, &bundle.resources_dir().join(&name)).await?;
        Some(name)
    } else {
        log::warn!("No icon container at {}, bundle will use the generic icon", icon.display());
        None
    };

    write_info_plist(&bundle, settings, icon_file.as_deref())?;
    log::info!("✓ Bundle ready: {}", bundle.root().display());
    Ok(bundle)
}

fn write_info_plist(
    bundle: &AppBundle,
    settings: &Settings,
    icon_file: Option<&str>,
) -> Result<(), BundleError> {
    let package = settings.package();
    let mut dict = plist::Dictionary::new();
    let mut set = |key: &str, value: plist::Value| {
        dict.insert(key.to_string(), value);
    };

    set("CFBundleDevelopmentRegion", "en".into());
    set("CFBundleDisplayName", package.product_name.clone().into());
    set("CFBundleExecutable", bundle.executable_name().into());
    set("CFBundleIdentifier", package.identifier.clone().into());
    set("CFBundleInfoDictionaryVersion", "6.0".into());
    set("CFBundleName", package.product_name.clone().into());
    set("CFBundlePackageType", "APPL".into());
    set("CFBundleShortVersionString", package.version.clone().into());
    set("CFBundleVersion", package.version.clone().into());
    set("LSApplicationCategoryType", package.category.clone().into());
    set("LSMinimumSystemVersion", package.minimum_system_version.clone().into());
    set("NSHighResolutionCapable", true.into());
    if let Some(icon) = icon_file {
        set("CFBundleIconFile", icon.into());
    }

    let path = bundle.info_plist();
    plist::Value::Dictionary(dict)
        .to_file_xml(&path)
        .map_err(Error::from)?;
    Ok(())
}
