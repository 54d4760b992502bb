//! Scanning a worker's main module for exported classes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

static EXPORT_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*export\s+(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)")
        .unwrap()
});

static EXPORT_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*export\s*(?:type\s+)?\{([^}]*)\}").unwrap());

/// Identifiers a source file exports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSet {
    names: BTreeSet<String>,
}

impl ExportSet {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Collect class exports and named export lists from source text.
///
/// `export { A as B }` contributes `B`, the name importers see.
pub fn scan_exports(source: &str) -> ExportSet {
    let mut names = BTreeSet::new();
    for cap in EXPORT_CLASS_RE.captures_iter(source) {
        names.insert(cap[1].to_string());
    }
    for cap in EXPORT_LIST_RE.captures_iter(source) {
        for item in cap[1].split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let exported = match item.split_once(" as ") {
                Some((_, alias)) => alias.trim(),
                None => item,
            };
            let exported = exported.trim_start_matches("type ").trim();
            if !exported.is_empty() {
                names.insert(exported.to_string());
            }
        }
    }
    ExportSet { names }
}

/// State of the main source file handed to the export rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainSource {
    /// The file exists and was scanned.
    Scanned { path: PathBuf, exports: ExportSet },
    /// The declared path does not exist.
    Missing { path: PathBuf },
    /// The path exists but could not be read.
    Unreadable { path: PathBuf, reason: String },
}

impl MainSource {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return MainSource::Missing {
                path: path.to_path_buf(),
            };
        }
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let exports = scan_exports(&text);
                tracing::debug!(path = %path.display(), count = exports.len(), "scanned exports");
                MainSource::Scanned {
                    path: path.to_path_buf(),
                    exports,
                }
            }
            Err(e) => MainSource::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            MainSource::Scanned { path, .. }
            | MainSource::Missing { path }
            | MainSource::Unreadable { path, .. } => path,
        }
    }
}

/// Auxiliary inputs for cross-file rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Companions {
    pub main: Option<MainSource>,
}

impl Companions {
    /// No companion data at all; cross-file rules report Info.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_main(path: &Path) -> Self {
        Self {
            main: Some(MainSource::load(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scan_class_exports() {
        let src = "\
import { DurableObject } from 'cloudflare:workers';

export class Counter extends DurableObject {}
export default class Worker {}
  export abstract class Base {}
class Hidden {}
";
        let exports = scan_exports(src);
        assert!(exports.contains("Counter"));
        assert!(exports.contains("Worker"));
        assert!(exports.contains("Base"));
        assert!(!exports.contains("Hidden"));
        assert_eq!(exports.len(), 3);
    }

    #[test]
    fn scan_export_lists_use_alias() {
        let src = "export { ChatRoom, Inner as Session, type Props };\n";
        let exports = scan_exports(src);
        let names: Vec<_> = exports.iter().collect();
        assert_eq!(names, vec!["ChatRoom", "Props", "Session"]);
    }

    #[test]
    fn scan_ignores_non_export_mentions() {
        let src = "// export class Commented {}\nconst s = 'export class InString';\n";
        let exports = scan_exports(src);
        assert!(exports.is_empty());
    }

    #[test]
    fn main_source_states() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.ts");

        assert!(matches!(MainSource::load(&path), MainSource::Missing { .. }));

        fs::write(&path, "export class Counter {}\n").unwrap();
        match MainSource::load(&path) {
            MainSource::Scanned { exports, .. } => assert!(exports.contains("Counter")),
            other => panic!("unexpected {:?}", other),
        }

        // A directory exists but cannot be read as text.
        let dir = tmp.path().join("src");
        fs::create_dir(&dir).unwrap();
        assert!(matches!(MainSource::load(&dir), MainSource::Unreadable { .. }));
    }
}
