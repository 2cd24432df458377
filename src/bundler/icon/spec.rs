//! Icon size set.

use std::fmt;

/// One raster in the iconset: a logical size at a display scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IconVariant {
    /// Logical point size.
    pub pixel_size: u32,
    /// 1 for standard, 2 for Retina.
    pub scale: u32,
}

impl IconVariant {
    /// Rendered pixel dimension (`pixel_size × scale`).
    pub fn pixels(&self) -> u32 {
        self.pixel_size * self.scale
    }

    /// `icon_{s}x{s}.png` or `icon_{s}x{s}@2x.png`, the names `iconutil` expects.
    pub fn file_name(&self) -> String {
        if self.scale == 1 {
            format!("icon_{0}x{0}.png", self.pixel_size)
        } else {
            format!("icon_{0}x{0}@{1}x.png", self.pixel_size, self.scale)
        }
    }

    /// Recovers the variant from a raster file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix("icon_")?.strip_suffix(".png")?;
        let (dims, scale) = match stem.split_once('@') {
            Some((dims, scale)) => (dims, scale.strip_suffix('x')?.parse().ok()?),
            None => (stem, 1),
        };
        let (w, h) = dims.split_once('x')?;
        let pixel_size: u32 = w.parse().ok()?;
        if h.parse::<u32>().ok()? != pixel_size {
            return None;
        }
        Some(Self { pixel_size, scale })
    }
}

impl fmt::Display for IconVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}@{1}x", self.pixel_size, self.scale)
    }
}

/// Ordered, duplicate-free set of icon variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSpec {
    variants: Vec<IconVariant>,
}

impl IconSpec {
    /// Logical sizes required by macOS.
    pub const MACOS_SIZES: [u32; 5] = [16, 32, 128, 256, 512];
    /// Standard and Retina.
    pub const MACOS_SCALES: [u32; 2] = [1, 2];

    /// Cartesian product of `sizes × scales`, sizes outermost.
    ///
    /// Repeated pairs are dropped so every variant maps to a distinct file.
    pub fn new(sizes: &[u32], scales: &[u32]) -> Self {
        let mut variants: Vec<IconVariant> = Vec::with_capacity(sizes.len() * scales.len());
        for &pixel_size in sizes {
            for &scale in scales {
                let variant = IconVariant { pixel_size, scale };
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
            }
        }
        Self { variants }
    }

    /// The fixed macOS set: 5 sizes × 2 scales.
    pub fn macos() -> Self {
        Self::new(&Self::MACOS_SIZES, &Self::MACOS_SCALES)
    }

    pub fn variants(&self) -> &[IconVariant] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl Default for IconSpec {
    fn default() -> Self {
        Self::macos()
    }
}
