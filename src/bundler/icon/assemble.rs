//! `.icns` container assembly from a complete iconset directory.

use super::{IconError, IconSpec};
use crate::bundler::error::ErrorExt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Packs every raster named by `spec` into `output`.
///
/// Each raster must exist and have exactly its expected pixel dimensions;
/// nothing is written otherwise. Returns the number of embedded icons.
pub fn assemble(iconset_dir: &Path, spec: &IconSpec, output: &Path) -> Result<usize, IconError> {
    let mut family = icns::IconFamily::new();

    for variant in spec.variants() {
        let path = iconset_dir.join(variant.file_name());
        if !path.is_file() {
            return Err(IconError::MissingRaster { path });
        }

        let raster = image::open(&path)
            .map_err(crate::bundler::Error::from)?
            .into_rgba8();
        let (width, height) = raster.dimensions();
        let expected = variant.pixels();
        if (width, height) != (expected, expected) {
            return Err(IconError::UnexpectedDimensions {
                path,
                expected,
                actual: (width, height),
            });
        }

        // The container keys icons by stored pixel dimensions, not point size.
        let icon_type = icns::IconType::from_pixel_size_and_density(
            expected,
            expected,
            variant.scale,
        )
        .ok_or(IconError::UnsupportedVariant(*variant))?;
        let image = icns::Image::from_data(icns::PixelFormat::RGBA, width, height, raster.into_raw())
            .fs_context("decoding raster", &path)?;
        family
            .add_icon_with_type(&image, icon_type)
            .fs_context("adding raster to icon family", &path)?;
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).fs_context("creating icon output directory", parent)?;
    }
    let staged = output.with_extension("icns.partial");
    let file = File::create(&staged).fs_context("creating icon container", &staged)?;
    family
        .write(BufWriter::new(file))
        .fs_context("writing icon container", &staged)?;
    std::fs::rename(&staged, output).fs_context("moving icon container into place", output)?;

    Ok(spec.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_raster(dir: &Path, name: &str, pixels: u32) {
        image::RgbaImage::from_pixel(pixels, pixels, image::Rgba([10, 20, 30, 128]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn refuses_partial_iconset() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = IconSpec::new(&[16, 32], &[1]);
        write_raster(tmp.path(), "icon_16x16.png", 16);
        let output = tmp.path().join("out.icns");

        let err = assemble(tmp.path(), &spec, &output).unwrap_err();

        assert!(matches!(err, IconError::MissingRaster { ref path } if path.ends_with("icon_32x32.png")));
        assert!(!output.exists());
    }

    #[test]
    fn rejects_wrongly_sized_raster() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = IconSpec::new(&[32], &[2]);
        write_raster(tmp.path(), "icon_32x32@2x.png", 32);

        let err = assemble(tmp.path(), &spec, &tmp.path().join("out.icns")).unwrap_err();

        assert!(matches!(
            err,
            IconError::UnexpectedDimensions { expected: 64, actual: (32, 32), .. }
        ));
    }

    #[test]
    fn packs_every_macos_variant() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = IconSpec::macos();
        for variant in spec.variants() {
            write_raster(tmp.path(), &variant.file_name(), variant.pixels());
        }
        let output = tmp.path().join("icon.icns");

        let count = assemble(tmp.path(), &spec, &output).unwrap();

        assert_eq!(count, 10);
        let family = icns::IconFamily::read(File::open(&output).unwrap()).unwrap();
        let stored = family.available_icons();
        assert_eq!(stored.len(), 10);
        for variant in spec.variants() {
            let icon_type = icns::IconType::from_pixel_size_and_density(
                variant.pixels(),
                variant.pixels(),
                variant.scale,
            )
            .unwrap();
            assert!(stored.contains(&icon_type), "{} missing", variant.file_name());
        }
        assert!(!tmp.path().join("icon.icns.partial").exists());
    }
}
