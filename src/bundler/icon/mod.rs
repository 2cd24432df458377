//! Iconset generation: one vector source in, one `.icns` out.
//!
//! Rasters are rendered into a `<name>.iconset` working directory next to the
//! output, checked, assembled, and the working directory is removed. Any
//! failure before assembly leaves the previous container untouched.

mod assemble;
mod rasterizer;
mod spec;

use crate::bundler::error::ErrorExt;
use std::path::{Path, PathBuf};

pub use assemble::assemble;
pub use rasterizer::{ImageMagick, Rasterizer, RsvgConvert, detect};
pub use spec::{IconSpec, IconVariant};

/// Icon generation failures.
#[derive(Debug, thiserror::Error)]
pub enum IconError {
    /// The vector source does not exist.
    #[error("icon source not found: {}", path.display())]
    MissingSourceAsset {
        /// Expected source path
        path: PathBuf,
    },

    /// Neither backend is installed.
    #[error("no rasterizer available (looked for rsvg-convert, magick, convert)")]
    NoRasterizerAvailable,

    /// A backend failed on one variant.
    #[error("{backend} failed to render {variant}: {source}")]
    RasterizationFailed {
        /// Backend name
        backend: String,
        /// Variant being rendered
        variant: IconVariant,
        /// Underlying failure
        source: crate::bundler::Error,
    },

    /// Assembly found the iconset incomplete.
    #[error("missing raster {}", path.display())]
    MissingRaster {
        /// Raster that should exist
        path: PathBuf,
    },

    /// A raster has the wrong pixel size.
    #[error("{} is {}x{}, expected {expected}x{expected}", path.display(), actual.0, actual.1)]
    UnexpectedDimensions {
        /// Offending raster
        path: PathBuf,
        /// Expected edge length
        expected: u32,
        /// Decoded dimensions
        actual: (u32, u32),
    },

    /// The container format has no slot for this variant.
    #[error("icon variant {0} cannot be stored in an .icns container")]
    UnsupportedVariant(IconVariant),

    /// Filesystem or decoding error.
    #[error(transparent)]
    Bundler(#[from] crate::bundler::Error),
}

/// `<output stem>.iconset` beside the output file.
pub fn iconset_dir_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "icon".into());
    output.with_file_name(format!("{stem}.iconset"))
}

/// Renders every variant of `spec` into `iconset_dir`, in spec order.
///
/// The directory is recreated first so stale rasters never leak into the
/// set. Stops at the first failing variant.
pub fn rasterize_iconset(
    source: &Path,
    iconset_dir: &Path,
    spec: &IconSpec,
    rasterizer: &dyn Rasterizer,
) -> Result<Vec<PathBuf>, IconError> {
    if !source.is_file() {
        return Err(IconError::MissingSourceAsset {
            path: source.to_path_buf(),
        });
    }

    if iconset_dir.exists() {
        std::fs::remove_dir_all(iconset_dir).fs_context("clearing iconset directory", iconset_dir)?;
    }
    std::fs::create_dir_all(iconset_dir).fs_context("creating iconset directory", iconset_dir)?;

    let mut rasters = Vec::with_capacity(spec.len());
    for variant in spec.variants() {
        let path = iconset_dir.join(variant.file_name());
        log::debug!("Rendering {} -> {}", variant, path.display());
        rasterizer
            .rasterize(source, variant.pixels(), &path)
            .map_err(|source| IconError::RasterizationFailed {
                backend: rasterizer.name().to_string(),
                variant: *variant,
                source,
            })?;
        rasters.push(path);
    }
    Ok(rasters)
}

/// Produces `output` from `source` with the given backend.
///
/// Returns the path of the assembled container.
pub fn generate(
    source: &Path,
    output: &Path,
    spec: &IconSpec,
    rasterizer: &dyn Rasterizer,
) -> Result<PathBuf, IconError> {
    let iconset_dir = iconset_dir_for(output);
    log::info!(
        "Rendering {} icon variants with {}",
        spec.len(),
        rasterizer.name()
    );

    let result = rasterize_iconset(source, &iconset_dir, spec, rasterizer)
        .and_then(|_| assemble(&iconset_dir, spec, output));

    match result {
        Ok(count) => {
            std::fs::remove_dir_all(&iconset_dir)
                .fs_context("removing iconset directory", &iconset_dir)?;
            log::info!("✓ Assembled {} icons into {}", count, output.display());
            Ok(output.to_path_buf())
        }
        Err(e) => {
            // A half-rendered iconset is never kept around for the next run.
            let _ = std::fs::remove_dir_all(&iconset_dir);
            Err(e)
        }
    }
}

/// [`generate`] with the backend chosen by probing the PATH.
pub fn generate_with_detected(
    source: &Path,
    output: &Path,
    spec: &IconSpec,
) -> Result<PathBuf, IconError> {
    if !source.is_file() {
        return Err(IconError::MissingSourceAsset {
            path: source.to_path_buf(),
        });
    }
    let rasterizer = detect().ok_or(IconError::NoRasterizerAvailable)?;
    log::info!("Generating {} with {}", output.display(), rasterizer.name());
    generate(source, output, spec, rasterizer.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Draws a solid translucent square; records each request.
    #[derive(Default)]
    struct PaintRasterizer {
        calls: Mutex<Vec<u32>>,
        fail_at: Option<u32>,
    }

    impl Rasterizer for PaintRasterizer {
        fn name(&self) -> &str {
            "paint"
        }

        fn rasterize(&self, _source: &Path, pixels: u32, output: &Path) -> crate::bundler::Result<()> {
            self.calls.lock().unwrap().push(pixels);
            if self.fail_at == Some(pixels) {
                crate::bail!("simulated failure at {pixels}px");
            }
            image::RgbaImage::from_pixel(pixels, pixels, image::Rgba([220, 40, 90, 200]))
                .save(output)?;
            Ok(())
        }
    }

    fn source(dir: &Path) -> PathBuf {
        let svg = dir.join("icon.svg");
        std::fs::write(&svg, r#"<svg xmlns="http://www.w3.org/2000/svg" width="1024" height="1024"/>"#).unwrap();
        svg
    }

    #[test]
    fn renders_ten_named_rasters() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        let iconset = tmp.path().join("HeartMuLa.iconset");

        let rasters =
            rasterize_iconset(&src, &iconset, &IconSpec::macos(), &PaintRasterizer::default()).unwrap();

        assert_eq!(rasters.len(), 10);
        let mut names: Vec<String> = std::fs::read_dir(&iconset)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        for name in &names {
            let variant = IconVariant::from_file_name(name).unwrap();
            let (w, h) = image::image_dimensions(iconset.join(name)).unwrap();
            assert_eq!((w, h), (variant.pixels(), variant.pixels()));
        }
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn assembles_container_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        let output = tmp.path().join("build/HeartMuLa.icns");

        let path = generate(&src, &output, &IconSpec::macos(), &PaintRasterizer::default()).unwrap();

        assert_eq!(path, output);
        assert!(!iconset_dir_for(&output).exists());
        let family = icns::IconFamily::read(std::fs::File::open(&output).unwrap()).unwrap();
        assert_eq!(family.available_icons().len(), 10);
    }

    #[test]
    fn repeated_runs_reproduce_rasters() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        let spec = IconSpec::macos();
        let first = tmp.path().join("a.iconset");
        let second = tmp.path().join("b.iconset");

        rasterize_iconset(&src, &first, &spec, &PaintRasterizer::default()).unwrap();
        rasterize_iconset(&src, &second, &spec, &PaintRasterizer::default()).unwrap();

        for variant in spec.variants() {
            let a = std::fs::read(first.join(variant.file_name())).unwrap();
            let b = std::fs::read(second.join(variant.file_name())).unwrap();
            assert_eq!(a, b, "{variant}");
        }
    }

    #[test]
    fn missing_source_is_reported_before_rendering() {
        let tmp = tempfile::tempdir().unwrap();
        let rasterizer = PaintRasterizer::default();

        let err = generate(
            &tmp.path().join("icon.svg"),
            &tmp.path().join("out.icns"),
            &IconSpec::macos(),
            &rasterizer,
        )
        .unwrap_err();

        assert!(matches!(err, IconError::MissingSourceAsset { .. }));
        assert!(rasterizer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_variant_aborts_before_assembly() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        let output = tmp.path().join("out.icns");
        let rasterizer = PaintRasterizer {
            fail_at: Some(256),
            ..Default::default()
        };

        let err = generate(&src, &output, &IconSpec::macos(), &rasterizer).unwrap_err();

        assert!(matches!(err, IconError::RasterizationFailed { ref variant, .. } if variant.pixels() == 256));
        assert!(!output.exists());
        assert!(!iconset_dir_for(&output).exists());
    }
}
