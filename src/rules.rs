//! Validation rules for Durable Objects wrangler configs.

use crate::exports::{Companions, MainSource};
use crate::model::{self, BindingRecord};
use crate::reader::ConfigDocument;
use crate::types::{Finding, Report, ValidateConfig};
use crate::xref::{ClassFate, CrossRefIndex};
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

static BINDING_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap());

static CLASS_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").unwrap());

const BINDINGS_SHAPE: &str = r#""durable_objects": {
  "bindings": [
    { "name": "MY_DURABLE_OBJECT", "class_name": "MyDurableObject" }
  ]
}"#;

const MIGRATIONS_SHAPE: &str = r#""migrations": [
  { "tag": "v1", "new_sqlite_classes": ["MyDurableObject"] }
]"#;

/// A single, independent check over a parsed config.
pub trait Rule {
    /// Short identifier shown next to findings.
    fn name(&self) -> &'static str;

    fn evaluate(&self, doc: &ConfigDocument, companions: &Companions) -> Result<Vec<Finding>>;
}

pub type RuleBox = Box<dyn Rule>;

/// Runs a fixed, ordered list of rules.
pub struct RuleEngine {
    rules: Vec<RuleBox>,
}

impl RuleEngine {
    pub fn new(rules: Vec<RuleBox>) -> Self {
        Self { rules }
    }

    /// The standard rule set, in presentation order.
    pub fn default_rules(config: ValidateConfig) -> Self {
        let config = Arc::new(config);
        Self::new(vec![
            Box::new(PresenceRule::new(Arc::clone(&config))),
            Box::new(ShapeRule::new(Arc::clone(&config))),
            Box::new(ConventionRule::new(Arc::clone(&config))),
            Box::new(UniquenessRule::new(Arc::clone(&config))),
            Box::new(MigrationsPresenceRule::new(Arc::clone(&config))),
            Box::new(MigrationShapeRule::new(Arc::clone(&config))),
            Box::new(CrossReferenceRule::new(Arc::clone(&config))),
            Box::new(SourceExportRule::new(Arc::clone(&config))),
            Box::new(AntiPatternRule::new(config)),
        ])
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Evaluate every rule. Never fails: a rule that errors or panics
    /// becomes an Info finding and the remaining rules still run.
    ///
    /// The process panic hook is left alone, so a panicking rule still
    /// prints its panic message to stderr.
    pub fn run(&self, doc: &ConfigDocument, companions: &Companions) -> Report {
        let mut report = Report::new();
        for rule in &self.rules {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(doc, companions)));
            match outcome {
                Ok(Ok(findings)) => {
                    tracing::debug!(rule = rule.name(), count = findings.len(), "rule finished");
                    report.extend(findings);
                }
                Ok(Err(e)) => {
                    tracing::warn!(rule = rule.name(), error = %e, "rule failed");
                    report.push(Finding::info(
                        rule.name(),
                        format!("Rule \"{}\" could not run: {:#}", rule.name(), e),
                    ));
                }
                Err(_) => {
                    tracing::warn!(rule = rule.name(), "rule panicked");
                    report.push(Finding::info(
                        rule.name(),
                        format!("Rule \"{}\" could not run: internal error", rule.name()),
                    ));
                }
            }
        }
        report
    }
}

macro_rules! config_rule {
    ($ty:ident) => {
        pub struct $ty {
            config: Arc<ValidateConfig>,
        }

        impl $ty {
            pub fn new(config: Arc<ValidateConfig>) -> Self {
                Self { config }
            }
        }
    };
}

config_rule!(PresenceRule);
config_rule!(ShapeRule);
config_rule!(ConventionRule);
config_rule!(UniquenessRule);
config_rule!(MigrationsPresenceRule);
config_rule!(MigrationShapeRule);
config_rule!(CrossReferenceRule);
config_rule!(SourceExportRule);
config_rule!(AntiPatternRule);

/// The bindings section must declare at least one binding.
impl Rule for PresenceRule {
    fn name(&self) -> &'static str {
        "presence"
    }

    fn evaluate(&self, doc: &ConfigDocument, _: &Companions) -> Result<Vec<Finding>> {
        if !doc.section(self.config.bindings_path).is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![
            Finding::error(
                self.name(),
                format!("No bindings found in \"{}\"", self.config.bindings_path),
            )
            .with_remediation(format!("Declare at least one binding:\n{}", BINDINGS_SHAPE)),
        ])
    }
}

/// Every binding needs `name` and `class_name`.
impl Rule for ShapeRule {
    fn name(&self) -> &'static str {
        "shape"
    }

    fn evaluate(&self, doc: &ConfigDocument, _: &Companions) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for b in model::bindings(doc, &self.config) {
            if !b.is_object {
                findings.push(
                    Finding::error(self.name(), format!("{} is not an object", b.label()))
                        .with_remediation(BINDINGS_SHAPE),
                );
                continue;
            }
            if b.name.is_none() {
                findings.push(
                    Finding::error(self.name(), format!("{} is missing \"name\"", b.label()))
                        .with_remediation("Add a \"name\", e.g. \"MY_DURABLE_OBJECT\""),
                );
            }
            if b.class_name.is_none() {
                findings.push(
                    Finding::error(
                        self.name(),
                        format!("{} is missing \"class_name\"", b.label()),
                    )
                    .with_remediation("Add the exported class, e.g. \"MyDurableObject\""),
                );
            }
        }
        Ok(findings)
    }
}

/// Naming conventions: UPPER_SNAKE binding names, PascalCase classes.
impl Rule for ConventionRule {
    fn name(&self) -> &'static str {
        "convention"
    }

    fn evaluate(&self, doc: &ConfigDocument, _: &Companions) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for b in model::bindings(doc, &self.config) {
            if let Some(name) = &b.name {
                if !BINDING_NAME_RE.is_match(name) {
                    findings.push(
                        Finding::warning(
                            self.name(),
                            format!("Binding name \"{}\" is not UPPER_SNAKE_CASE", name),
                        )
                        .with_remediation(format!("Rename to \"{}\"", upper_snake(name))),
                    );
                }
            }
            if let Some(class) = &b.class_name {
                if !CLASS_NAME_RE.is_match(class) {
                    findings.push(
                        Finding::warning(
                            self.name(),
                            format!("Class name \"{}\" in {} is not PascalCase", class, b.label()),
                        )
                        .with_remediation("Class names should start with an uppercase letter"),
                    );
                }
            }
        }
        Ok(findings)
    }
}

fn upper_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_uppercase());
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    out.trim_matches('_').to_string()
}

/// Binding names must be unique.
impl Rule for UniquenessRule {
    fn name(&self) -> &'static str {
        "uniqueness"
    }

    fn evaluate(&self, doc: &ConfigDocument, _: &Companions) -> Result<Vec<Finding>> {
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for b in model::bindings(doc, &self.config) {
            if let Some(name) = b.name {
                *seen.entry(name).or_default() += 1;
            }
        }
        let dupes: Vec<String> = seen
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, n)| format!("{} (x{})", name, n))
            .collect();
        if dupes.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![
            Finding::error(
                self.name(),
                format!("Duplicate binding names: {}", dupes.join(", ")),
            )
            .with_remediation("Each binding needs its own name"),
        ])
    }
}

/// A config with bindings needs a migration history.
impl Rule for MigrationsPresenceRule {
    fn name(&self) -> &'static str {
        "migrations-presence"
    }

    fn evaluate(&self, doc: &ConfigDocument, _: &Companions) -> Result<Vec<Finding>> {
        if doc.section(self.config.bindings_path).is_empty()
            || !doc.section(self.config.migrations_path).is_empty()
        {
            return Ok(vec![]);
        }
        Ok(vec![
            Finding::error(
                self.name(),
                format!("No migrations found in \"{}\"", self.config.migrations_path),
            )
            .with_remediation(format!(
                "Add a top-level migration for each class:\n{}",
                MIGRATIONS_SHAPE
            )),
        ])
    }
}

/// Every migration needs a unique `tag`.
impl Rule for MigrationShapeRule {
    fn name(&self) -> &'static str {
        "migration-shape"
    }

    fn evaluate(&self, doc: &ConfigDocument, _: &Companions) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let mut tags: BTreeMap<String, usize> = BTreeMap::new();
        for m in model::migrations(doc, &self.config) {
            match &m.tag {
                Some(tag) => *tags.entry(tag.clone()).or_default() += 1,
                None => findings.push(
                    Finding::error(self.name(), format!("{} is missing \"tag\"", m.label()))
                        .with_remediation("Give each migration a unique tag such as \"v1\""),
                ),
            }
        }
        for (tag, n) in tags {
            if n > 1 {
                findings.push(
                    Finding::error(
                        self.name(),
                        format!("Migration tag \"{}\" is used {} times", tag, n),
                    )
                    .with_remediation("Migration tags must be unique"),
                );
            }
        }
        Ok(findings)
    }
}

/// Classes named by migrations should line up with bound classes.
///
/// Only warns: a class may be bound from another worker's config.
impl Rule for CrossReferenceRule {
    fn name(&self) -> &'static str {
        "cross-reference"
    }

    fn evaluate(&self, doc: &ConfigDocument, _: &Companions) -> Result<Vec<Finding>> {
        let index = CrossRefIndex::build(
            model::bindings(doc, &self.config),
            model::migrations(doc, &self.config),
        );
        let fates = index.class_fates();
        let mut findings = Vec::new();
        let mut reported = BTreeSet::new();

        // Classes still live after every migration should have a binding.
        for m in index.migrations() {
            for class in &m.new_classes {
                let live = fates.get(class.as_str()) == Some(&ClassFate::Live);
                if live && index.resolve(class).is_none() && reported.insert(class.as_str()) {
                    findings.push(
                        Finding::warning(
                            self.name(),
                            format!("Class \"{}\" added in {} has no binding", class, m.label()),
                        )
                        .with_remediation(format!(
                            "Bind \"{}\" or remove it from the migration",
                            class
                        )),
                    );
                }
            }
            for rename in &m.renamed {
                let to = rename.to.as_str();
                let live = fates.get(to) == Some(&ClassFate::Live);
                if live && index.resolve(to).is_none() && reported.insert(to) {
                    findings.push(Finding::warning(
                        self.name(),
                        format!(
                            "Class \"{}\" renamed from \"{}\" in {} has no binding",
                            rename.to,
                            rename.from,
                            m.label()
                        ),
                    ));
                }
            }
        }

        // Bound classes must be live at the end of the history.
        let mut bound = BTreeSet::new();
        for b in index.bindings().iter().filter(|b| !b.is_external()) {
            let Some(class) = &b.class_name else { continue };
            if !bound.insert(class.as_str()) {
                continue;
            }
            let finding = match fates.get(class.as_str()) {
                Some(ClassFate::Live) => continue,
                Some(ClassFate::Deleted { migration }) => Finding::warning(
                    self.name(),
                    format!(
                        "Class \"{}\" deleted in {} is still bound by {}",
                        class,
                        migration.label(),
                        b.label()
                    ),
                )
                .with_remediation("Remove the binding or add the class back in a new migration"),
                Some(ClassFate::RenamedTo { to, migration }) => Finding::warning(
                    self.name(),
                    format!(
                        "Class \"{}\" was renamed to \"{}\" in {} but {} still uses the old name",
                        class,
                        to,
                        migration.label(),
                        b.label()
                    ),
                )
                .with_remediation(format!("Set \"class_name\": \"{}\"", to)),
                None => Finding::warning(
                    self.name(),
                    format!("Class \"{}\" is bound but never added by a migration", class),
                )
                .with_remediation(format!(
                    "Add \"{}\" to \"new_sqlite_classes\" in a new migration",
                    class
                )),
            };
            findings.push(finding);
        }
        Ok(findings)
    }
}

/// Bound classes must be exported from the worker's main module.
impl Rule for SourceExportRule {
    fn name(&self) -> &'static str {
        "source-export"
    }

    fn evaluate(&self, doc: &ConfigDocument, companions: &Companions) -> Result<Vec<Finding>> {
        let bindings: Vec<BindingRecord> = model::bindings(doc, &self.config)
            .into_iter()
            .filter(|b| !b.is_external())
            .collect();
        if bindings.is_empty() {
            return Ok(vec![]);
        }

        let (path, exports) = match &companions.main {
            None => {
                return Ok(vec![Finding::info(
                    self.name(),
                    "No main file declared; skipping export check",
                )
                .with_remediation("Set \"main\" in the config or pass --main")]);
            }
            Some(MainSource::Missing { path }) => {
                return Ok(vec![Finding::info(
                    self.name(),
                    format!("Main file {} not found; skipping export check", path.display()),
                )]);
            }
            Some(MainSource::Unreadable { path, reason }) => {
                bail!("cannot read {}: {}", path.display(), reason);
            }
            Some(MainSource::Scanned { path, exports }) => (path, exports),
        };

        let mut findings = Vec::new();
        for b in &bindings {
            let Some(class) = &b.class_name else { continue };
            if !exports.contains(class) {
                findings.push(
                    Finding::error(
                        self.name(),
                        format!(
                            "Class \"{}\" for {} is not exported from {}",
                            class,
                            b.label(),
                            path.display()
                        ),
                    )
                    .with_remediation(format!(
                        "Add `export class {} extends DurableObject`",
                        class
                    )),
                );
            }
        }
        Ok(findings)
    }
}

/// Known-bad legacy shapes and missing recommended fields.
impl Rule for AntiPatternRule {
    fn name(&self) -> &'static str {
        "anti-pattern"
    }

    fn evaluate(&self, doc: &ConfigDocument, _: &Companions) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        let section = self
            .config
            .bindings_path
            .rsplit_once('.')
            .map(|(parent, _)| parent);
        if let Some(parent) = section {
            let nested = format!("{}.{}", parent, self.config.migrations_path);
            if doc.get(&nested).is_some() {
                findings.push(
                    Finding::error(
                        self.name(),
                        format!("\"{}\" is not supported; migrations must be top-level", nested),
                    )
                    .with_remediation(format!(
                        "Move the migrations array out of \"{}\":\n{}",
                        parent, MIGRATIONS_SHAPE
                    )),
                );
            }
        }

        for field in &self.config.recommended_fields {
            if doc.get(field).is_none() {
                findings.push(
                    Finding::warning(
                        self.name(),
                        format!("Missing recommended field \"{}\"", field),
                    )
                    .with_remediation(format!("Add \"{}\" to pin runtime behavior", field)),
                );
            }
        }
        Ok(findings)
    }
}
