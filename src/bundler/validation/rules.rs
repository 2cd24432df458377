//! Default rule set for the HeartMuLa Studio macOS release.

use super::types::{Severity, ValidationRule};
use crate::bundler::settings::{BundleSettings, PathSettings};

const REQUIREMENTS: &str = "backend/requirements.txt";

/// Rules derived from the configured paths and bundle data.
///
/// Replaced wholesale when `release.toml` declares `[[validation.rules]]`.
pub fn default_rules(paths: &PathSettings, bundle: &BundleSettings) -> Vec<ValidationRule> {
    let mut rules = vec![
        ValidationRule::file(paths.entry_point.to_string_lossy(), Severity::Error)
            .with_hint("the launcher script is the bundle's entry point"),
        ValidationRule::file(paths.icon_source.to_string_lossy(), Severity::Error)
            .with_hint("add the square, transparent vector icon"),
        ValidationRule::dir(paths.hooks_dir.to_string_lossy(), Severity::Warning)
            .with_hint("freezer hooks collect heartlib submodules"),
        ValidationRule::file(paths.launcher_shortcut.to_string_lossy(), Severity::Error),
        ValidationRule::file(paths.readme.to_string_lossy(), Severity::Error),
        ValidationRule::file("frontend/dist/index.html", Severity::Error)
            .with_hint("build the frontend first: (cd frontend && npm ci && npm run build)"),
        ValidationRule::file(REQUIREMENTS, Severity::Error),
        ValidationRule::contains(REQUIREMENTS, r"(?mi)^\s*fastapi\b", Severity::Error),
        ValidationRule::contains(REQUIREMENTS, r"(?mi)^\s*uvicorn\b", Severity::Error),
        ValidationRule::contains(REQUIREMENTS, r"(?mi)^\s*pywebview\b", Severity::Warning)
            .with_hint("without pywebview the app falls back to opening a browser tab"),
        ValidationRule::pinned_below(
            REQUIREMENTS,
            "numpy",
            semver::Version::new(2, 0, 0),
            Severity::Warning,
        )
        .with_hint("pin numpy below 2.0 (e.g. numpy<2) for torch wheel compatibility"),
    ];

    for mapping in &bundle.data {
        rules.push(ValidationRule::dir(
            mapping.source.to_string_lossy(),
            Severity::Error,
        ));
    }

    rules
}
