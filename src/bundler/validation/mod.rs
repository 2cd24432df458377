//! Pre-flight validation of release inputs.
//!
//! Rules are data: adding a required asset means adding one
//! [`ValidationRule`], not new control flow. [`validate`] never touches the
//! filesystem beyond reading it; [`ValidationReport::gate`] turns the report
//! into a pass/fail decision for the pipeline.

mod checks;
mod rules;
mod types;

use std::path::Path;

pub use rules::default_rules;
pub use types::{ContentCheck, RuleKind, RuleOutcome, Severity, ValidationReport, ValidationRule};

/// ERROR-severity rules failed.
#[derive(Debug, thiserror::Error)]
#[error("{} required input(s) failed validation:\n  {}", failed.len(), failed.join("\n  "))]
pub struct ValidationFailure {
    /// One line per failed ERROR rule.
    pub failed: Vec<String>,
    /// Remediation hints from the failed rules.
    pub hints: Vec<String>,
}

/// Check every rule against `root`, in order.
///
/// Produces exactly one outcome per rule.
pub fn validate(rules: &[ValidationRule], root: &Path) -> ValidationReport {
    let outcomes = rules
        .iter()
        .map(|rule| {
            let outcome = checks::check_rule(rule, root);
            log::debug!("{}", outcome.line());
            outcome
        })
        .collect();
    ValidationReport::new(outcomes)
}

impl ValidationReport {
    /// Fails when any ERROR-severity rule failed.
    pub fn gate(&self) -> Result<(), ValidationFailure> {
        if self.all_passed() {
            return Ok(());
        }

        let errors: Vec<&RuleOutcome> = self
            .failures()
            .filter(|o| o.rule.severity == Severity::Error)
            .collect();

        Err(ValidationFailure {
            failed: errors
                .iter()
                .map(|o| format!("{}: {}", o.rule.describe(), o.detail))
                .collect(),
            hints: errors.iter().filter_map(|o| o.rule.hint.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_outcome_per_rule_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        std::fs::create_dir(tmp.path().join("d")).unwrap();

        let rules = vec![
            ValidationRule::dir("missing-dir", Severity::Warning),
            ValidationRule::file("a.txt", Severity::Error),
            ValidationRule::contains("a.txt", "world", Severity::Error),
            ValidationRule::dir("d", Severity::Error),
            ValidationRule::file("missing.txt", Severity::Error),
        ];

        let report = validate(&rules, tmp.path());

        let seen: Vec<&ValidationRule> = report.outcomes().iter().map(|o| &o.rule).collect();
        assert_eq!(seen, rules.iter().collect::<Vec<_>>());
        let passed: Vec<bool> = report.outcomes().iter().map(|o| o.passed).collect();
        assert_eq!(passed, vec![false, true, false, true, false]);
        assert_eq!(report.error_count(), 2);
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn warnings_never_contribute_to_error_count() {
        let tmp = tempfile::tempdir().unwrap();
        let rules: Vec<ValidationRule> = (0..4)
            .map(|i| ValidationRule::file(format!("w{i}"), Severity::Warning))
            .collect();

        let report = validate(&rules, tmp.path());

        assert_eq!(report.error_count(), 0);
        assert_eq!(report.warning_count(), 4);
        assert!(report.gate().is_ok());
    }

    #[test]
    fn missing_required_file_and_unpinned_dependency() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("requirements.txt"), "fastapi\nnumpy>=1.24\n").unwrap();

        let rules = vec![
            ValidationRule::file("launcher.py", Severity::Error).with_hint("add the launcher"),
            ValidationRule::pinned_below(
                "requirements.txt",
                "numpy",
                semver::Version::new(2, 0, 0),
                Severity::Warning,
            ),
        ];

        let report = validate(&rules, tmp.path());

        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);

        let failure = report.gate().unwrap_err();
        assert_eq!(failure.failed, vec!["file launcher.py: not found".to_string()]);
        assert_eq!(failure.hints, vec!["add the launcher".to_string()]);
    }

    #[test]
    fn rules_deserialize_from_toml() {
        #[derive(serde::Deserialize)]
        struct Doc {
            rules: Vec<ValidationRule>,
        }

        let doc: Doc = toml::from_str(
            r#"
            [[rules]]
            path = "launcher.py"
            kind = "file"

            [[rules]]
            path = "backend/requirements.txt"
            kind = "content_pattern"
            severity = "warning"
            check = { pinned_below = { package = "numpy", ceiling = "2.0.0" } }

            [[rules]]
            path = "backend/requirements.txt"
            kind = "content_pattern"
            check = { matches = "fastapi" }
            "#,
        )
        .unwrap();

        assert_eq!(doc.rules[0], ValidationRule::file("launcher.py", Severity::Error));
        assert_eq!(
            doc.rules[1],
            ValidationRule::pinned_below(
                "backend/requirements.txt",
                "numpy",
                semver::Version::new(2, 0, 0),
                Severity::Warning
            )
        );
        assert_eq!(
            doc.rules[2].kind,
            RuleKind::ContentPattern {
                check: ContentCheck::Matches("fastapi".into())
            }
        );
    }
}
