//! `validate-config`: check a wrangler config's Durable Objects setup.

use binding_audit::{exit_code_for, init_logging, run_validate, ExitPolicy, ValidateConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "validate-config",
    version,
    about = "Validate Durable Objects bindings and migrations in a wrangler config"
)]
struct Cli {
    /// Config file (defaults to wrangler.jsonc or wrangler.json in the project root)
    config: Option<PathBuf>,

    /// Main source file to check exports against (defaults to the config's "main")
    #[arg(long)]
    main: Option<PathBuf>,

    /// Treat warnings as blocking
    #[arg(long)]
    strict: bool,

    /// Debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_policy = if cli.strict {
        ExitPolicy::Strict
    } else {
        ExitPolicy::Standard
    };
    let config = ValidateConfig::durable_objects();

    match run_validate(cli.config.as_deref(), cli.main.as_deref(), exit_policy, &config) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}
