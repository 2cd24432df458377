//! Rule evaluation against the project tree.
//!
//! Every check is read-only.

use super::types::{ContentCheck, RuleKind, RuleOutcome, ValidationRule};
use regex::Regex;
use semver::Version;
use std::path::Path;
use std::sync::LazyLock;

static REQUIREMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[[^\]]*\])?\s*(.*)$")
        .expect("requirement pattern is valid")
});

static VERSION_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(===|==|<=|<|~=|>=|>|!=)\s*([0-9][0-9A-Za-z.*+!-]*)$")
        .expect("clause pattern is valid")
});

/// Evaluate one rule.
pub(super) fn check_rule(rule: &ValidationRule, root: &Path) -> RuleOutcome {
    match &rule.kind {
        RuleKind::File => check_exists(rule, root, |p| p.is_file(), "file"),
        RuleKind::Dir => check_exists(rule, root, |p| p.is_dir(), "directory"),
        RuleKind::ContentPattern { check } => check_content(rule, root, check),
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn check_exists(
    rule: &ValidationRule,
    root: &Path,
    accept: impl Fn(&Path) -> bool,
    noun: &str,
) -> RuleOutcome {
    if is_glob(&rule.path) {
        let pattern = root.join(&rule.path);
        let matches = match glob::glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths.flatten().filter(|p| accept(p)).count(),
            Err(e) => return RuleOutcome::fail(rule, format!("invalid pattern: {}", e)),
        };
        return if matches > 0 {
            RuleOutcome::pass(rule, format!("{} match(es)", matches))
        } else {
            RuleOutcome::fail(rule, format!("no {} matches", noun))
        };
    }

    let path = root.join(&rule.path);
    if accept(&path) {
        RuleOutcome::pass(rule, "found")
    } else if path.exists() {
        RuleOutcome::fail(rule, format!("exists but is not a {}", noun))
    } else {
        RuleOutcome::fail(rule, "not found")
    }
}

fn check_content(rule: &ValidationRule, root: &Path, check: &ContentCheck) -> RuleOutcome {
    let path = root.join(&rule.path);
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return RuleOutcome::fail(rule, "not found");
        }
        Err(e) => return RuleOutcome::fail(rule, format!("unreadable: {}", e)),
    };

    match check {
        ContentCheck::Matches(pattern) => match Regex::new(pattern) {
            Ok(re) if re.is_match(&contents) => RuleOutcome::pass(rule, "pattern found"),
            Ok(_) => RuleOutcome::fail(rule, "pattern not found"),
            Err(e) => RuleOutcome::fail(rule, format!("invalid pattern: {}", e)),
        },
        ContentCheck::PinnedBelow { package, ceiling } => {
            match requirement_spec(&contents, package) {
                None => RuleOutcome::fail(rule, format!("{} is not listed", package)),
                Some(spec) => match upper_bound(&spec) {
                    None => RuleOutcome::fail(
                        rule,
                        format!("{} is unpinned (`{}{}`)", package, package, spec),
                    ),
                    Some(bound) if bound.is_below(ceiling) => {
                        RuleOutcome::pass(rule, format!("{}{}", package, spec))
                    }
                    Some(bound) => RuleOutcome::fail(
                        rule,
                        format!(
                            "{}{} allows {} (known-bad release is {})",
                            package,
                            spec,
                            bound.version(),
                            ceiling
                        ),
                    ),
                },
            }
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}

/// Finds the version specifier for `package` in a requirements-style file.
///
/// Returns the specifier with whitespace removed (`""` for a bare name).
fn requirement_spec(contents: &str, package: &str) -> Option<String> {
    let wanted = normalize_name(package);
    contents.lines().find_map(|line| {
        let line = line.split('#').next().unwrap_or("");
        let line = line.split(';').next().unwrap_or("").trim();
        let caps = REQUIREMENT_LINE.captures(line)?;
        if normalize_name(&caps[1]) != wanted {
            return None;
        }
        Some(caps[2].split_whitespace().collect::<String>())
    })
}

/// Upper bound a specifier places on the installed version.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Bound {
    Inclusive(Version),
    Exclusive(Version),
}

impl Bound {
    fn is_below(&self, ceiling: &Version) -> bool {
        match self {
            Bound::Inclusive(v) => v < ceiling,
            Bound::Exclusive(v) => v <= ceiling,
        }
    }

    fn version(&self) -> &Version {
        match self {
            Bound::Inclusive(v) | Bound::Exclusive(v) => v,
        }
    }
}

fn upper_bound(spec: &str) -> Option<Bound> {
    spec.split(',')
        .filter_map(|clause| {
            let caps = VERSION_CLAUSE.captures(clause)?;
            let raw = &caps[2];
            match &caps[1] {
                "==" | "===" => match raw.strip_suffix(".*") {
                    Some(prefix) => bump_last(prefix).map(Bound::Exclusive),
                    None => lenient_version(raw).map(Bound::Inclusive),
                },
                "<=" => lenient_version(raw).map(Bound::Inclusive),
                "<" => lenient_version(raw).map(Bound::Exclusive),
                "~=" => {
                    let parts: Vec<&str> = raw.split('.').collect();
                    if parts.len() < 2 {
                        return None;
                    }
                    bump_last(&parts[..parts.len() - 1].join(".")).map(Bound::Exclusive)
                }
                _ => None,
            }
        })
        .min_by(|a, b| a.version().cmp(b.version()))
}

fn numeric_parts(raw: &str) -> Vec<u64> {
    raw.split('.')
        .map_while(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .collect()
}

/// Parses `2`, `1.26` or `1.26.4rc1` into a three-part version.
fn lenient_version(raw: &str) -> Option<Version> {
    let parts = numeric_parts(raw);
    if parts.is_empty() {
        return None;
    }
    Some(Version::new(
        parts[0],
        parts.get(1).copied().unwrap_or(0),
        parts.get(2).copied().unwrap_or(0),
    ))
}

/// `1.26` -> `1.27.0`, `2` -> `3.0.0`.
fn bump_last(prefix: &str) -> Option<Version> {
    let mut parts = numeric_parts(prefix);
    let last = parts.last_mut()?;
    *last += 1;
    parts.truncate(3);
    Some(Version::new(
        parts[0],
        parts.get(1).copied().unwrap_or(0),
        parts.get(2).copied().unwrap_or(0),
    ))
}
