//! Validation for Durable Objects wrangler configs and sync for workflow templates.

mod discovery;
mod exports;
mod model;
mod reader;
mod report;
mod rules;
mod sync;
mod types;
mod xref;

pub use discovery::{find_config_file, find_root, find_root_from_cwd};
pub use exports::{scan_exports, Companions, ExportSet, MainSource};
pub use model::{BindingRecord, MigrationRecord, Rename};
pub use reader::{load, parse, strip_line_comments, ConfigDocument, ReadError};
pub use report::{policy, render, summarize, ExitPolicy, EXIT_FINDINGS, EXIT_INPUT, EXIT_OK};
pub use rules::{Rule, RuleBox, RuleEngine};
pub use sync::{
    file_checksum, list_templates, sync, FileState, SyncError, SyncOptions, SyncReport, SyncStatus,
    TemplateEntry, TemplateSource,
};
pub use types::{Counts, Finding, Report, Severity, SyncConfig, ValidateConfig};
pub use xref::{ClassFate, CrossRefIndex};

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Install a stderr log subscriber. `RUST_LOG` wins unless `verbose` is set.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Companion data for `doc`: `main_override` if given, else the
/// document's `main` field resolved against the config's directory.
pub fn resolve_companions(doc: &ConfigDocument, main_override: Option<&Path>) -> Companions {
    let main = match main_override {
        Some(p) => Some(p.to_path_buf()),
        None => doc.get_str("main").map(|m| doc.base_dir().join(m)),
    };
    match main {
        Some(path) => {
            tracing::debug!(main = %path.display(), "resolved main file");
            Companions::with_main(&path)
        }
        None => Companions::none(),
    }
}

/// Load `config_path` and run every rule over it.
pub fn validate(
    config_path: &Path,
    main_override: Option<&Path>,
    config: &ValidateConfig,
) -> std::result::Result<Report, ReadError> {
    let doc = load(config_path)?;
    let companions = resolve_companions(&doc, main_override);
    let engine = RuleEngine::default_rules(config.clone());
    Ok(engine.run(&doc, &companions))
}

/// Locate the config: the explicit path, or the first known config name
/// in the project root.
pub fn locate_config(
    path: Option<&Path>,
    config: &ValidateConfig,
) -> std::result::Result<PathBuf, ReadError> {
    if let Some(p) = path {
        return Ok(p.to_path_buf());
    }
    let root = find_root_from_cwd(&config.root_markers);
    find_config_file(&root, &config.config_names).ok_or_else(|| ReadError::NotFound {
        path: root.join(config.config_names.first().copied().unwrap_or("wrangler.jsonc")),
    })
}

/// Validate a config and print the report.
///
/// Returns the process exit code. Input errors are returned as `Err`.
pub fn run_validate(
    path: Option<&Path>,
    main_override: Option<&Path>,
    exit_policy: ExitPolicy,
    config: &ValidateConfig,
) -> Result<i32> {
    let config_path = locate_config(path, config)?;
    let report = validate(&config_path, main_override, config)?;

    println!("Validating {}...\n", config_path.display());
    let (text, code) = summarize(&report, exit_policy);
    print!("{}", text);
    Ok(code)
}

/// Sync templates and print per-file status.
///
/// Relative `templates`/`dest` resolve against the project root found
/// from the working directory.
pub fn run_sync(
    templates: Option<&Path>,
    dest: Option<&Path>,
    options: SyncOptions,
    config: &SyncConfig,
) -> Result<i32> {
    let root = find_root_from_cwd(&config.root_markers);
    run_sync_in(&root, templates, dest, options, config)
}

/// `run_sync` against an explicit project root.
///
/// Returns 0 once every template was visited, whatever each file's status.
pub fn run_sync_in(
    root: &Path,
    templates: Option<&Path>,
    dest: Option<&Path>,
    options: SyncOptions,
    config: &SyncConfig,
) -> Result<i32> {
    let template_dir = root.join(templates.unwrap_or_else(|| Path::new(config.template_dir)));
    let dest_dir = root.join(dest.unwrap_or_else(|| Path::new(config.dest_dir)));
    println!(
        "Syncing {} -> {}\n",
        template_dir.display(),
        dest_dir.display()
    );

    let report = sync(&template_dir, &dest_dir, options)?;
    print!("{}", report.render());
    Ok(EXIT_OK)
}

/// Exit code for an error that ended a run before it produced a report.
///
/// Unreadable or unparseable config input maps to `EXIT_INPUT`; anything
/// else, such as a missing template directory, to `EXIT_FINDINGS`.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ReadError>().is_some() {
        EXIT_INPUT
    } else {
        EXIT_FINDINGS
    }
}
