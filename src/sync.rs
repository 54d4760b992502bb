//! Template sync: copy canonical templates into a project and report drift.

use crate::types::{Finding, Report};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SOURCE: &str = "sync";

/// Failures that stop a sync before any file is visited.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("template directory not found: {}", path.display())]
    MissingTemplateDir { path: PathBuf },

    #[error("invalid template path pattern for {}: {source}", path.display())]
    Pattern {
        path: PathBuf,
        #[source]
        source: glob::PatternError,
    },
}

/// Options for one sync run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Overwrite destination files that differ from their template.
    pub force: bool,
    /// Plan only; write nothing.
    pub dry_run: bool,
}

/// Destination state relative to its template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Missing,
    Identical,
    Differing,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Created,
    Updated,
    UpToDate,
    SkippedDiffers,
    Failed(String),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Created => f.write_str("Created"),
            SyncStatus::Updated => f.write_str("Updated"),
            SyncStatus::UpToDate => f.write_str("Up to date"),
            SyncStatus::SkippedDiffers => f.write_str("Skipped (differs)"),
            SyncStatus::Failed(_) => f.write_str("Failed"),
        }
    }
}

/// One template and its destination counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    /// Path relative to the template directory, with `/` separators.
    pub rel_path: String,
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub exists_at_dest: bool,
    pub content_differs: bool,
}

impl TemplateEntry {
    pub fn state(&self) -> FileState {
        match (self.exists_at_dest, self.content_differs) {
            (false, _) => FileState::Missing,
            (true, false) => FileState::Identical,
            (true, true) => FileState::Differing,
        }
    }
}

/// Result of one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub entries: Vec<(TemplateEntry, SyncStatus)>,
    pub findings: Report,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn count(&self, pred: impl Fn(&SyncStatus) -> bool) -> usize {
        self.entries.iter().filter(|(_, s)| pred(s)).count()
    }

    pub fn status_of(&self, rel_path: &str) -> Option<&SyncStatus> {
        self.entries
            .iter()
            .find(|(e, _)| e.rel_path == rel_path)
            .map(|(_, s)| s)
    }

    /// Per-file status lines followed by the summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.dry_run {
            out.push_str("Dry run: no files written\n");
        }
        for (entry, status) in &self.entries {
            match status {
                SyncStatus::Failed(reason) => {
                    let _ = writeln!(out, "{}: {} ({})", status, entry.rel_path, reason);
                }
                _ => {
                    let _ = writeln!(out, "{}: {}", status, entry.rel_path);
                }
            }
        }
        for f in self.findings.findings() {
            let _ = writeln!(out, "  {} {}", f.severity.marker(), f.message);
            if let Some(fix) = &f.remediation {
                let _ = writeln!(out, "      {}", fix);
            }
        }
        let _ = writeln!(
            out,
            "\nSummary: {} created, {} updated, {} up to date, {} skipped, {} failed",
            self.count(|s| *s == SyncStatus::Created),
            self.count(|s| *s == SyncStatus::Updated),
            self.count(|s| *s == SyncStatus::UpToDate),
            self.count(|s| *s == SyncStatus::SkippedDiffers),
            self.count(|s| matches!(s, SyncStatus::Failed(_))),
        );
        out
    }
}

/// SHA-256 of a file's bytes as `sha256:<hex>`.
pub fn file_checksum(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

/// One entry found under the template directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// A regular file to sync.
    File(PathBuf),
    /// Something that cannot be synced: an unreadable directory entry,
    /// a dangling symlink, a socket.
    Unusable { path: PathBuf, reason: String },
}

impl TemplateSource {
    pub fn path(&self) -> &Path {
        match self {
            TemplateSource::File(path) | TemplateSource::Unusable { path, .. } => path,
        }
    }
}

fn classify(path: PathBuf) -> Option<TemplateSource> {
    if path.is_dir() {
        return None;
    }
    if path.is_file() {
        return Some(TemplateSource::File(path));
    }
    let reason = match std::fs::symlink_metadata(&path) {
        Ok(meta) if meta.file_type().is_symlink() => "dangling symlink".to_string(),
        Ok(_) => "not a regular file".to_string(),
        Err(e) => e.to_string(),
    };
    Some(TemplateSource::Unusable { path, reason })
}

/// Everything under `template_dir` except directories, sorted by path.
///
/// Entries the walk could not read are returned as `Unusable`.
pub fn list_templates(template_dir: &Path) -> Result<Vec<TemplateSource>, SyncError> {
    if !template_dir.is_dir() {
        return Err(SyncError::MissingTemplateDir {
            path: template_dir.to_path_buf(),
        });
    }
    let escaped = glob::Pattern::escape(&template_dir.to_string_lossy());
    let pattern = format!("{}/**/*", escaped);
    let options = glob::MatchOptions {
        require_literal_leading_dot: false,
        ..Default::default()
    };
    let entries = glob::glob_with(&pattern, options).map_err(|source| SyncError::Pattern {
        path: template_dir.to_path_buf(),
        source,
    })?;
    let mut sources: Vec<TemplateSource> = entries
        .filter_map(|entry| match entry {
            Ok(path) => classify(path),
            Err(e) => Some(TemplateSource::Unusable {
                path: e.path().to_path_buf(),
                reason: e.error().to_string(),
            }),
        })
        .collect();
    sources.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(sources)
}

fn rel_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Entry for `source` before its destination has been looked at.
fn unchecked_entry(template_dir: &Path, dest_dir: &Path, source: &Path) -> TemplateEntry {
    let rel = source.strip_prefix(template_dir).unwrap_or(source);
    TemplateEntry {
        rel_path: rel_string(rel),
        source_path: source.to_path_buf(),
        dest_path: dest_dir.join(rel),
        exists_at_dest: false,
        content_differs: false,
    }
}

/// Compare one template against its destination.
fn inspect(
    template_dir: &Path,
    dest_dir: &Path,
    source: &Path,
) -> std::io::Result<TemplateEntry> {
    let mut entry = unchecked_entry(template_dir, dest_dir, source);
    entry.exists_at_dest = entry.dest_path.exists();
    entry.content_differs =
        entry.exists_at_dest && file_checksum(source)? != file_checksum(&entry.dest_path)?;
    Ok(entry)
}

fn copy_template(entry: &TemplateEntry) -> std::io::Result<()> {
    if let Some(parent) = entry.dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(&entry.source_path, &entry.dest_path)?;
    Ok(())
}

/// Mirror every file in `template_dir` into `dest_dir`.
///
/// Per-file failures are recorded and do not stop the run.
pub fn sync(
    template_dir: &Path,
    dest_dir: &Path,
    options: SyncOptions,
) -> Result<SyncReport, SyncError> {
    let templates = list_templates(template_dir)?;
    tracing::info!(
        templates = templates.len(),
        from = %template_dir.display(),
        to = %dest_dir.display(),
        "syncing templates"
    );

    let mut report = SyncReport {
        dry_run: options.dry_run,
        ..Default::default()
    };

    for template in &templates {
        let source = match template {
            TemplateSource::File(path) => path,
            TemplateSource::Unusable { path, reason } => {
                let entry = unchecked_entry(template_dir, dest_dir, path);
                report.findings.push(Finding::error(
                    SOURCE,
                    format!("Could not read template {}: {}", entry.rel_path, reason),
                ));
                report.entries.push((entry, SyncStatus::Failed(reason.clone())));
                continue;
            }
        };
        let entry = match inspect(template_dir, dest_dir, source) {
            Ok(entry) => entry,
            Err(e) => {
                let entry = unchecked_entry(template_dir, dest_dir, source);
                report.findings.push(Finding::error(
                    SOURCE,
                    format!("Could not compare {}: {}", entry.rel_path, e),
                ));
                report.entries.push((entry, SyncStatus::Failed(e.to_string())));
                continue;
            }
        };

        let status = match (entry.state(), options.force) {
            (FileState::Identical, _) => SyncStatus::UpToDate,
            (FileState::Differing, false) => {
                report.findings.push(
                    Finding::warning(
                        SOURCE,
                        format!("{} differs from its template", entry.rel_path),
                    )
                    .with_remediation("Re-run with --force to overwrite, or reconcile by hand"),
                );
                SyncStatus::SkippedDiffers
            }
            (state, _) => {
                let done = if state == FileState::Missing {
                    SyncStatus::Created
                } else {
                    SyncStatus::Updated
                };
                if options.dry_run {
                    done
                } else {
                    match copy_template(&entry) {
                        Ok(()) => done,
                        Err(e) => {
                            report.findings.push(Finding::error(
                                SOURCE,
                                format!("Could not write {}: {}", entry.dest_path.display(), e),
                            ));
                            SyncStatus::Failed(e.to_string())
                        }
                    }
                }
            }
        };
        tracing::debug!(
            file = %entry.rel_path,
            state = ?entry.state(),
            status = %status,
            "template"
        );
        report.entries.push((entry, status));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let templates = tmp.path().join("templates");
        let dest = tmp.path().join("project/.github/workflows");
        fs::create_dir_all(templates.join("nested")).unwrap();
        fs::write(templates.join("ci.yml"), "name: ci\n").unwrap();
        fs::write(templates.join("deploy.yml"), "name: deploy\n").unwrap();
        fs::write(templates.join("nested/release.yml"), "name: release\n").unwrap();
        (tmp, templates, dest)
    }

    fn force() -> SyncOptions {
        SyncOptions {
            force: true,
            dry_run: false,
        }
    }

    #[test]
    fn creates_all_into_empty_dest() {
        let (_tmp, templates, dest) = setup();
        let report = sync(&templates, &dest, SyncOptions::default()).unwrap();
        assert_eq!(report.count(|s| *s == SyncStatus::Created), 3);
        assert_eq!(report.count(|s| *s == SyncStatus::SkippedDiffers), 0);
        assert_eq!(
            fs::read_to_string(dest.join("nested/release.yml")).unwrap(),
            "name: release\n"
        );
        assert!(report.findings.findings().is_empty());
    }

    #[test]
    fn differing_file_is_skipped_without_force() {
        let (_tmp, templates, dest) = setup();
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("ci.yml"), "name: local edit\n").unwrap();

        let report = sync(&templates, &dest, SyncOptions::default()).unwrap();
        assert_eq!(report.status_of("ci.yml"), Some(&SyncStatus::SkippedDiffers));
        assert_eq!(report.status_of("deploy.yml"), Some(&SyncStatus::Created));
        assert_eq!(report.status_of("nested/release.yml"), Some(&SyncStatus::Created));
        assert_eq!(fs::read_to_string(dest.join("ci.yml")).unwrap(), "name: local edit\n");

        let warnings: Vec<_> = report.findings.with_severity(Severity::Warning).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].remediation.as_deref().unwrap().contains("--force"));
    }

    #[test]
    fn force_overwrites_then_settles() {
        let (_tmp, templates, dest) = setup();
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("ci.yml"), "name: local edit\n").unwrap();

        let first = sync(&templates, &dest, force()).unwrap();
        assert_eq!(first.status_of("ci.yml"), Some(&SyncStatus::Updated));
        assert_eq!(fs::read_to_string(dest.join("ci.yml")).unwrap(), "name: ci\n");

        let second = sync(&templates, &dest, force()).unwrap();
        assert_eq!(second.count(|s| *s == SyncStatus::UpToDate), 3);
        assert_eq!(second.entries.len(), 3);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (_tmp, templates, dest) = setup();
        let options = SyncOptions {
            force: true,
            dry_run: true,
        };
        let report = sync(&templates, &dest, options).unwrap();
        assert_eq!(report.count(|s| *s == SyncStatus::Created), 3);
        assert!(!dest.exists());
        assert!(report.render().starts_with("Dry run"));
    }

    #[test]
    fn missing_template_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = sync(&tmp.path().join("nope"), tmp.path(), SyncOptions::default()).unwrap_err();
        assert!(matches!(err, SyncError::MissingTemplateDir { .. }));
    }

    #[test]
    fn write_failure_is_isolated() {
        let (_tmp, templates, dest) = setup();
        fs::create_dir_all(&dest).unwrap();
        // A directory where a file should go cannot be overwritten.
        fs::create_dir_all(dest.join("nested/release.yml")).unwrap();

        let report = sync(&templates, &dest, force()).unwrap();
        assert!(matches!(
            report.status_of("nested/release.yml"),
            Some(SyncStatus::Failed(_))
        ));
        assert_eq!(report.count(|s| *s == SyncStatus::Created), 2);
        assert_eq!(report.findings.counts().errors, 1);
    }

    #[test]
    fn templates_listed_sorted_including_dotfiles() {
        let (_tmp, templates, _dest) = setup();
        fs::write(templates.join(".hidden.yml"), "x").unwrap();
        let files = list_templates(&templates).unwrap();
        assert!(files.iter().all(|f| matches!(f, TemplateSource::File(_))));
        let rels: Vec<_> = files
            .iter()
            .map(|f| rel_string(f.path().strip_prefix(&templates).unwrap()))
            .collect();
        assert_eq!(rels, vec![".hidden.yml", "ci.yml", "deploy.yml", "nested/release.yml"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_reported() {
        let (_tmp, templates, dest) = setup();
        std::os::unix::fs::symlink(templates.join("gone.yml"), templates.join("broken.yml"))
            .unwrap();

        let report = sync(&templates, &dest, SyncOptions::default()).unwrap();
        assert_eq!(report.entries.len(), 4);
        assert_eq!(
            report.status_of("broken.yml"),
            Some(&SyncStatus::Failed("dangling symlink".to_string()))
        );
        assert_eq!(report.count(|s| *s == SyncStatus::Created), 3);
        let errors: Vec<_> = report.findings.with_severity(Severity::Error).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("broken.yml"));
        assert!(report.render().contains("Failed: broken.yml (dangling symlink)"));
        assert!(!dest.join("broken.yml").exists());
    }

    #[test]
    fn render_lists_status_lines_and_summary() {
        let (_tmp, templates, dest) = setup();
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("deploy.yml"), "name: deploy\n").unwrap();
        fs::write(dest.join("ci.yml"), "changed\n").unwrap();

        let text = sync(&templates, &dest, SyncOptions::default()).unwrap().render();
        assert!(text.contains("Skipped (differs): ci.yml\n"));
        assert!(text.contains("Up to date: deploy.yml\n"));
        assert!(text.contains("Created: nested/release.yml\n"));
        assert!(text.contains("Summary: 1 created, 0 updated, 1 up to date, 1 skipped, 0 failed"));
    }

    #[test]
    fn checksum_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello world").unwrap();
        assert_eq!(
            file_checksum(&path).unwrap(),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
