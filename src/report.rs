//! Rendering reports and mapping them to process exit codes.

use crate::types::{Counts, Finding, Report, Severity};
use std::fmt::Write;

/// Exit code for a run with no blocking findings.
pub const EXIT_OK: i32 = 0;
/// Exit code when blocking findings were reported.
pub const EXIT_FINDINGS: i32 = 1;
/// Exit code when the input could not be read or parsed.
pub const EXIT_INPUT: i32 = 2;

/// Which severities block a CI pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Only errors fail the run.
    #[default]
    Standard,
    /// Errors and warnings both fail the run.
    Strict,
}

impl ExitPolicy {
    pub fn exit_code(self, counts: Counts) -> i32 {
        let blocking = match self {
            ExitPolicy::Standard => counts.errors,
            ExitPolicy::Strict => counts.errors + counts.warnings,
        };
        if blocking > 0 { EXIT_FINDINGS } else { EXIT_OK }
    }
}

/// Exit code under the standard policy.
pub fn policy(counts: Counts) -> i32 {
    ExitPolicy::Standard.exit_code(counts)
}

fn heading(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "Errors",
        Severity::Warning => "Warnings",
        Severity::Info => "Info",
    }
}

fn write_finding(out: &mut String, f: &Finding) {
    let _ = writeln!(out, "  {} [{}] {}", f.severity.marker(), f.source, f.message);
    if let Some(fix) = &f.remediation {
        for line in fix.lines() {
            let _ = writeln!(out, "      {}", line);
        }
    }
}

/// Render findings grouped by severity, ending with the summary line.
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        let group: Vec<&Finding> = report.with_severity(severity).collect();
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{} ({}):", heading(severity), group.len());
        for f in group {
            write_finding(&mut out, f);
        }
        out.push('\n');
    }
    let counts = report.counts();
    if counts.errors == 0 && counts.warnings == 0 {
        out.push_str("No issues found \u{2713}\n");
    }
    let _ = writeln!(out, "Errors: {}, Warnings: {}", counts.errors, counts.warnings);
    out
}

/// Render the report and compute its exit code.
pub fn summarize(report: &Report, exit_policy: ExitPolicy) -> (String, i32) {
    (render(report), exit_policy.exit_code(report.counts()))
}
