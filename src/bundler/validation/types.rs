//! Validation rules and the report they produce.

use serde::Deserialize;
use std::fmt;

/// Whether a failed rule blocks the release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Failure blocks the pipeline.
    #[default]
    Error,
    /// Failure is reported only.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("ERROR"),
            Severity::Warning => f.write_str("WARN"),
        }
    }
}

/// What a content rule looks for inside its file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCheck {
    /// The file contains a match for this regular expression.
    Matches(String),
    /// The requirement for `package` is pinned to a version below `ceiling`.
    PinnedBelow {
        /// Requirement name, as written in the dependency manifest
        package: String,
        /// First known-bad release
        ceiling: semver::Version,
    },
}

/// What a rule checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// A regular file (or at least one file matching a glob) exists.
    File,
    /// A directory (or at least one directory matching a glob) exists.
    Dir,
    /// A text file exists and satisfies a content check.
    ContentPattern {
        /// The check to run on the file's contents
        check: ContentCheck,
    },
}

/// One required input of a release.
///
/// # Configuration
///
/// ```toml
/// [[validation.rules]]
/// path = "backend/requirements.txt"
/// kind = "content_pattern"
/// severity = "warning"
/// check = { pinned_below = { package = "numpy", ceiling = "2.0.0" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidationRule {
    /// Path or glob pattern, relative to the project root.
    pub path: String,

    /// What to check at that path.
    #[serde(flatten)]
    pub kind: RuleKind,

    /// Whether a failure blocks the release.
    #[serde(default)]
    pub severity: Severity,

    /// Remediation shown when the rule fails.
    #[serde(default)]
    pub hint: Option<String>,
}

impl ValidationRule {
    /// Rule requiring a file.
    pub fn file(path: impl Into<String>, severity: Severity) -> Self {
        Self::new(path, RuleKind::File, severity)
    }

    /// Rule requiring a directory.
    pub fn dir(path: impl Into<String>, severity: Severity) -> Self {
        Self::new(path, RuleKind::Dir, severity)
    }

    /// Rule requiring a regex match inside a text file.
    pub fn contains(path: impl Into<String>, pattern: impl Into<String>, severity: Severity) -> Self {
        Self::new(
            path,
            RuleKind::ContentPattern {
                check: ContentCheck::Matches(pattern.into()),
            },
            severity,
        )
    }

    /// Rule requiring a dependency pinned below a known-bad release.
    pub fn pinned_below(
        path: impl Into<String>,
        package: impl Into<String>,
        ceiling: semver::Version,
        severity: Severity,
    ) -> Self {
        Self::new(
            path,
            RuleKind::ContentPattern {
                check: ContentCheck::PinnedBelow {
                    package: package.into(),
                    ceiling,
                },
            },
            severity,
        )
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn new(path: impl Into<String>, kind: RuleKind, severity: Severity) -> Self {
        Self {
            path: path.into(),
            kind,
            severity,
            hint: None,
        }
    }

    /// Short human description, e.g. `file launcher.py`.
    pub fn describe(&self) -> String {
        match &self.kind {
            RuleKind::File => format!("file {}", self.path),
            RuleKind::Dir => format!("dir {}", self.path),
            RuleKind::ContentPattern {
                check: ContentCheck::Matches(pattern),
            } => format!("{} matches /{}/", self.path, pattern),
            RuleKind::ContentPattern {
                check: ContentCheck::PinnedBelow { package, ceiling },
            } => format!("{} pins {} < {}", self.path, package, ceiling),
        }
    }
}

/// Result of checking one rule.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    /// The rule that was checked.
    pub rule: ValidationRule,
    /// Whether the rule held.
    pub passed: bool,
    /// What was found.
    pub detail: String,
}

impl RuleOutcome {
    pub(crate) fn pass(rule: &ValidationRule, detail: impl Into<String>) -> Self {
        Self {
            rule: rule.clone(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub(crate) fn fail(rule: &ValidationRule, detail: impl Into<String>) -> Self {
        Self {
            rule: rule.clone(),
            passed: false,
            detail: detail.into(),
        }
    }

    /// One summary line: `✗ [ERROR] file launcher.py: not found`.
    pub fn line(&self) -> String {
        let icon = if self.passed { "✓" } else { "✗" };
        let status = if self.passed {
            "PASS".to_string()
        } else {
            self.rule.severity.to_string()
        };
        format!("{} [{}] {}: {}", icon, status, self.rule.describe(), self.detail)
    }
}

/// Ordered outcomes of one validation run.
///
/// Built once and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    outcomes: Vec<RuleOutcome>,
    error_count: usize,
}

impl ValidationReport {
    pub(crate) fn new(outcomes: Vec<RuleOutcome>) -> Self {
        let error_count = outcomes
            .iter()
            .filter(|o| !o.passed && o.rule.severity == Severity::Error)
            .count();
        Self {
            outcomes,
            error_count,
        }
    }

    /// Outcomes in rule order.
    pub fn outcomes(&self) -> &[RuleOutcome] {
        &self.outcomes
    }

    /// Failed ERROR-severity rules.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Failed WARNING-severity rules.
    pub fn warning_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.passed && o.rule.severity == Severity::Warning)
            .count()
    }

    /// Every failed outcome, errors and warnings alike.
    pub fn failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// Returns true if no ERROR rule failed.
    pub fn all_passed(&self) -> bool {
        self.error_count == 0
    }

    /// Summary line for the end of the report.
    pub fn summary(&self) -> String {
        let passed = self.outcomes.iter().filter(|o| o.passed).count();
        format!(
            "{}/{} passed, {} error(s), {} warning(s)",
            passed,
            self.outcomes.len(),
            self.error_count,
            self.warning_count()
        )
    }
}
