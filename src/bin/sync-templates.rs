//! `sync-templates`: copy canonical workflow templates into the project.

use binding_audit::{exit_code_for, init_logging, run_sync, SyncConfig, SyncOptions};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sync-templates", version, about = "Sync workflow templates into the project")]
struct Cli {
    /// Overwrite files that differ from their template
    #[arg(long)]
    force: bool,

    /// Show what would change without writing
    #[arg(long)]
    dry_run: bool,

    /// Template directory, relative to the project root
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Destination directory, relative to the project root
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = SyncOptions {
        force: cli.force,
        dry_run: cli.dry_run,
    };
    let config = SyncConfig::github_workflows();

    match run_sync(cli.templates.as_deref(), cli.dest.as_deref(), options, &config) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}
