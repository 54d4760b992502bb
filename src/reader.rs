//! Loading "JSON with comments" config files.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that stop a config from being validated at all.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file is empty: {}", path.display())]
    Empty { path: PathBuf },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a JSON object at the top level of {}", path.display())]
    NotAnObject { path: PathBuf },
}

/// A parsed config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    path: PathBuf,
    root: Map<String, Value>,
}

impl ConfigDocument {
    /// Build a document from an already-parsed JSON object.
    pub fn from_value(path: impl Into<PathBuf>, value: Value) -> Result<Self, ReadError> {
        let path = path.into();
        match value {
            Value::Object(root) => Ok(Self { path, root }),
            _ => Err(ReadError::NotAnObject { path }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative paths inside the document resolve against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Look up a dotted path such as `durable_objects.bindings`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let mut cur = self.root.get(parts.next()?)?;
        for part in parts {
            cur = cur.as_object()?.get(part)?;
        }
        Some(cur)
    }

    /// Array at a dotted path. A missing section reads as empty.
    pub fn section(&self, dotted: &str) -> &[Value] {
        self.get(dotted)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_str(&self, dotted: &str) -> Option<&str> {
        self.get(dotted).and_then(Value::as_str)
    }
}

/// Remove lines whose first non-whitespace characters are `//`.
///
/// Trailing comments after content are left alone.
pub fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if !line.trim_start().starts_with("//") {
            out.push_str(line);
        }
    }
    out
}

/// Parse config text that may contain full-line `//` comments.
pub fn parse(path: &Path, text: &str) -> Result<ConfigDocument, ReadError> {
    if text.trim().is_empty() {
        return Err(ReadError::Empty {
            path: path.to_path_buf(),
        });
    }
    let stripped = strip_line_comments(text);
    let value: Value = serde_json::from_str(&stripped).map_err(|source| ReadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigDocument::from_value(path, value)
}

/// Read and parse a config file.
pub fn load(path: &Path) -> Result<ConfigDocument, ReadError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ReadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ReadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "loaded config");
    parse(path, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // --- strip_line_comments ---

    #[test]
    fn strip_removes_full_line_comments() {
        let text = "{\n  // comment\n  \"a\": 1\n}\n";
        assert_eq!(strip_line_comments(text), "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn strip_keeps_trailing_comments() {
        let text = "{ \"a\": 1 } // trailing\n";
        assert_eq!(strip_line_comments(text), text);
    }

    #[test]
    fn strip_is_noop_without_comments() {
        let text = "{\n  \"url\": \"https://example.com\"\n}";
        assert_eq!(strip_line_comments(text), text);
    }

    #[test]
    fn strip_is_idempotent() {
        let text = "// head\n{\n\t// tab indented\n  \"a\": [1, 2]\n}\n// tail";
        let once = strip_line_comments(text);
        assert_eq!(strip_line_comments(&once), once);
    }

    #[test]
    fn strip_handles_last_line_without_newline() {
        assert_eq!(strip_line_comments("{}\n// end"), "{}\n");
    }

    // --- parse / load ---

    #[test]
    fn parse_jsonc() {
        let text = "// wrangler config\n{\n  // name\n  \"name\": \"worker\"\n}\n";
        let doc = parse(Path::new("wrangler.jsonc"), text).unwrap();
        assert_eq!(doc.get_str("name"), Some("worker"));
    }

    #[test]
    fn parse_empty_is_error() {
        let err = parse(Path::new("w.jsonc"), "  \n").unwrap_err();
        assert!(matches!(err, ReadError::Empty { .. }));
    }

    #[test]
    fn parse_only_comments_is_parse_error() {
        let err = parse(Path::new("w.jsonc"), "// nothing here\n").unwrap_err();
        assert!(matches!(err, ReadError::Parse { .. }));
    }

    #[test]
    fn parse_inline_comment_is_parse_error() {
        let err = parse(Path::new("w.jsonc"), "{ \"a\": 1 // no\n}").unwrap_err();
        assert!(matches!(err, ReadError::Parse { .. }));
    }

    #[test]
    fn parse_array_root_is_rejected() {
        let err = parse(Path::new("w.json"), "[1, 2]").unwrap_err();
        assert!(matches!(err, ReadError::NotAnObject { .. }));
    }

    #[test]
    fn load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = load(&tmp.path().join("nope.jsonc")).unwrap_err();
        assert!(matches!(err, ReadError::NotFound { .. }));
        assert!(err.to_string().contains("nope.jsonc"));
    }

    #[test]
    fn load_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wrangler.jsonc");
        fs::write(&path, "{ \"main\": \"src/index.ts\" }").unwrap();
        let doc = load(&path).unwrap();
        assert_eq!(doc.get_str("main"), Some("src/index.ts"));
        assert_eq!(doc.base_dir(), tmp.path());
    }

    // --- document access ---

    #[test]
    fn dotted_lookup_and_missing_sections() {
        let doc = parse(
            Path::new("w.json"),
            r#"{ "durable_objects": { "bindings": [ { "name": "A" } ] } }"#,
        )
        .unwrap();
        assert_eq!(doc.section("durable_objects.bindings").len(), 1);
        assert!(doc.section("migrations").is_empty());
        assert!(doc.get("durable_objects.missing.deeper").is_none());
    }

    #[test]
    fn section_that_is_not_an_array_reads_empty() {
        let doc = parse(Path::new("w.json"), r#"{ "migrations": "v1" }"#).unwrap();
        assert!(doc.section("migrations").is_empty());
    }
}
