//! Application metadata.

use serde::Deserialize;

/// Application metadata written into the bundle.
///
/// # Examples
///
/// ```no_run
/// use heartmula_release::bundler::PackageSettings;
///
/// let settings = PackageSettings {
///     product_name: "HeartMuLa Studio".into(),
///     version: "1.2.0".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Product name displayed to users; also the `.app` and volume name.
    pub product_name: String,

    /// Name of the executable inside `Contents/MacOS`.
    pub executable_name: String,

    /// Bundle identifier in reverse domain notation.
    pub identifier: String,

    /// Version string, e.g. "1.0.0".
    pub version: String,

    /// LSApplicationCategoryType.
    pub category: String,

    /// LSMinimumSystemVersion.
    pub minimum_system_version: String,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            product_name: "HeartMuLa Studio".into(),
            executable_name: "HeartMuLa".into(),
            identifier: "com.heartmula.studio".into(),
            version: "1.0.0".into(),
            category: "public.app-category.music".into(),
            minimum_system_version: "12.0".into(),
        }
    }
}
