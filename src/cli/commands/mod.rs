//! Subcommand handlers.
//!
//! Each handler runs one entry point of [`ReleasePipeline`] and reports the
//! result through the [`RuntimeConfig`] output.

use super::RuntimeConfig;
use crate::bundler::{ReleasePipeline, validation::Severity};
use crate::error::Result;

pub fn validate_only(pipeline: &ReleasePipeline, config: &RuntimeConfig) -> Result<()> {
    let report = pipeline.check_inputs();

    config.section("Validation")?;
    for outcome in report.outcomes() {
        match (outcome.passed, outcome.rule.severity) {
            (true, _) => config.verbose_println(&outcome.line())?,
            (false, Severity::Warning) => config.warn(&outcome.line())?,
            (false, Severity::Error) => config.indent(&outcome.line())?,
        }
    }
    config.indent(&report.summary())?;

    report.gate()?;
    config.success("All required inputs present")?;
    Ok(())
}

pub async fn build_icon(pipeline: &ReleasePipeline, config: &RuntimeConfig) -> Result<()> {
    config.progress("Generating application icon")?;
    let icon = pipeline.build_icon().await?;
    config.success(&format!("Icon written to {}", icon.display()))?;
    Ok(())
}

pub async fn bundle(pipeline: &ReleasePipeline, config: &RuntimeConfig) -> Result<()> {
    config.progress("Freezing launcher and composing bundle")?;
    let bundle = pipeline.bundle().await?;
    config.success(&format!("Bundle written to {}", bundle.root().display()))?;
    Ok(())
}

pub fn sign(pipeline: &ReleasePipeline, config: &RuntimeConfig) -> Result<()> {
    let bundle = pipeline.open_bundle()?;
    config.progress(&format!(
        "Signing {} with {} identity",
        bundle.root().display(),
        pipeline.settings().signing_identity()
    ))?;

    let signed = pipeline.sign(bundle)?;
    let report = signed.report();
    for signed_target in &report.signed {
        config.verbose_println(&format!(
            "[depth {}] {}{}",
            signed_target.target.depth,
            signed_target.target.path.display(),
            if signed_target.hardened { " (hardened)" } else { "" }
        ))?;
    }
    for warning in &report.warnings {
        config.warn(&warning.to_string())?;
    }
    config.success(&format!(
        "Signed and verified {} targets ({} fallback warnings)",
        report.signed.len(),
        report.warnings.len()
    ))?;
    Ok(())
}

pub async fn package(pipeline: &ReleasePipeline, config: &RuntimeConfig) -> Result<()> {
    let signed = pipeline.verify_existing(pipeline.open_bundle()?)?;
    config.progress("Building disk image")?;

    let manifest = pipeline.package(&signed).await?;
    let artifact = &manifest.artifact;
    config.success(&format!(
        "Disk image: {} ({} bytes)",
        artifact.disk_image.display(),
        artifact.size_bytes
    ))?;
    config.indent(&format!("sha256 {}", artifact.sha256))?;
    Ok(())
}

pub async fn release(pipeline: &ReleasePipeline, config: &RuntimeConfig) -> Result<()> {
    config.section(&format!(
        "Releasing {} {}",
        pipeline.settings().product_name(),
        pipeline.settings().version_string()
    ))?;

    let outcome = pipeline.release().await?;

    for warning in outcome.validation.failures() {
        config.warn(&warning.line())?;
    }
    for warning in &outcome.manifest.signing.warnings {
        config.warn(warning)?;
    }
    let artifact = &outcome.manifest.artifact;
    config.success(&format!("Icon: {}", outcome.icon.display()))?;
    config.success(&format!(
        "Signed {} targets with {} identity",
        outcome.manifest.signing.targets,
        pipeline.settings().signing_identity()
    ))?;
    config.success(&format!(
        "Disk image: {} ({} bytes)",
        artifact.disk_image.display(),
        artifact.size_bytes
    ))?;
    config.indent(&format!("sha256 {}", artifact.sha256))?;
    config.indent(&format!("manifest {}", outcome.manifest_path.display()))?;
    Ok(())
}

pub async fn smoke_test(pipeline: &ReleasePipeline, config: &RuntimeConfig) -> Result<()> {
    config.progress(&format!(
        "Launching {} and polling {}",
        pipeline.settings().app_bundle_path().display(),
        pipeline.settings().smoke().health_url
    ))?;
    let report = pipeline.smoke_test().await?;
    config.success(&format!(
        "{} healthy after {:.1}s",
        report.url,
        report.elapsed.as_secs_f64()
    ))?;
    Ok(())
}
