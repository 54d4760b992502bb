//! Core types for config validation and template sync.

use std::fmt;

/// Configuration for wrangler config discovery and validation.
///
/// Different projects can customize behavior by providing different configs.
#[derive(Debug, Clone)]
pub struct ValidateConfig {
    /// Project root marker files, checked in order.
    pub root_markers: Vec<&'static str>,

    /// Config file names tried in the project root when no path is given.
    pub config_names: Vec<&'static str>,

    /// Dotted path to the bindings array, e.g. `durable_objects.bindings`.
    pub bindings_path: &'static str,

    /// Dotted path to the migrations array.
    pub migrations_path: &'static str,

    /// Migration keys whose string lists introduce new classes.
    pub new_class_keys: Vec<&'static str>,

    /// Migration key listing classes removed by that step.
    pub deleted_classes_key: &'static str,

    /// Migration key listing `{from, to}` renames.
    pub renamed_classes_key: &'static str,

    /// Top-level fields that should be present but are not required.
    pub recommended_fields: Vec<&'static str>,
}

impl ValidateConfig {
    /// Durable Objects layout used by `wrangler.jsonc` / `wrangler.json`.
    pub fn durable_objects() -> Self {
        Self {
            root_markers: vec!["wrangler.jsonc", "wrangler.json", "package.json"],
            config_names: vec!["wrangler.jsonc", "wrangler.json"],
            bindings_path: "durable_objects.bindings",
            migrations_path: "migrations",
            new_class_keys: vec!["new_classes", "new_sqlite_classes"],
            deleted_classes_key: "deleted_classes",
            renamed_classes_key: "renamed_classes",
            recommended_fields: vec!["compatibility_date"],
        }
    }
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self::durable_objects()
    }
}

/// Configuration for template sync.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Project root marker files, checked in order.
    pub root_markers: Vec<&'static str>,

    /// Canonical templates, relative to the project root.
    pub template_dir: &'static str,

    /// Where templates land, relative to the project root.
    pub dest_dir: &'static str,
}

impl SyncConfig {
    /// GitHub Actions workflow templates synced into `.github/workflows`.
    pub fn github_workflows() -> Self {
        Self {
            root_markers: vec!["package.json", "Cargo.toml"],
            template_dir: "templates/github-workflows",
            dest_dir: ".github/workflows",
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::github_workflows()
    }
}

/// How serious a finding is. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn marker(self) -> &'static str {
        match self {
            Severity::Error => "\u{2717}",
            Severity::Warning => "\u{26a0}",
            Severity::Info => "\u{2139}",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// A single issue reported by a rule or by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    /// Name of the rule (or engine) that produced it.
    pub source: &'static str,
    pub message: String,
    pub remediation: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, source: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            source,
            message: message.into(),
            remediation: None,
        }
    }

    pub fn error(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, source, message)
    }

    pub fn warning(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, source, message)
    }

    pub fn info(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, source, message)
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}

/// Per-severity totals for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

/// All findings from one run, in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    findings: Vec<Finding>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for f in &self.findings {
            match f.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }
}
