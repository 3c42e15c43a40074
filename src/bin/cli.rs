//! tracegit CLI - traceability between requirements, code, and tests.
//!
//! Usage:
//!   tracegit init                  # Create .tracegit/
//!   tracegit scan                  # Index metadata blocks
//!   tracegit status --orphans      # Counts, stale links, orphans
//!   tracegit impact SR-010         # Downstream review set
//!   tracegit relevant src/auth.py  # Upstream context for a file
//!   tracegit validate              # Aggregated findings
//!   tracegit watch                 # Rescan on file changes

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracegit::cli::{handlers, Cli, Commands, HooksAction};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let format = cli.format;

    match cli.command {
        Commands::Init { force } => {
            println!("{}", handlers::init(&root, force)?);
        }
        Commands::Scan { paths } => {
            print!("{}", handlers::scan_cmd(&root, &paths, format)?);
        }
        Commands::Status { stale, orphans } => {
            print!("{}", handlers::status(&root, stale, orphans, format)?);
        }
        Commands::Show { id } => {
            print!("{}", handlers::show(&root, &id, format)?);
        }
        Commands::Link { from, to, relation } => {
            println!("{}", handlers::link(&root, &from, &to, &relation)?);
        }
        Commands::Confirm { id, to } => {
            println!("{}", handlers::confirm(&root, &id, to.as_deref())?);
        }
        Commands::Impact { id, depth } => {
            print!("{}", handlers::impact(&root, &id, depth, format)?);
        }
        Commands::Relevant { file, depth } => {
            print!("{}", handlers::relevant(&root, &file, depth, format)?);
        }
        Commands::Validate { path } => {
            let (text, clean) = handlers::validate_cmd(&root, path.as_deref(), format)?;
            print!("{text}");
            if !clean {
                return Ok(1);
            }
        }
        Commands::Fmt { check } => {
            let (out, needs) = handlers::fmt_cmd(&root, check, format)?;
            print!("{out}");
            if check && needs {
                return Ok(1);
            }
        }
        Commands::Hooks { action } => match action {
            HooksAction::Install { all } => {
                print!("{}", handlers::hooks_install_cmd(&root, all, format)?);
            }
        },
        Commands::Watch { paths, debounce_ms } => {
            println!("Watching for changes (Ctrl-C to stop)...");
            tracegit::watch::watch(
                &root,
                &paths,
                Duration::from_millis(debounce_ms),
                |report| {
                    if report.has_changes() {
                        print!("{}", tracegit::report::render_scan(report));
                    }
                },
            )?;
        }
    }
    Ok(0)
}
