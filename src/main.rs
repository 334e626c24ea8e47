//! vitae - live preview server for HTML/CSS resumes.

mod actor;
mod cli;
mod config;
mod core;
mod embed;
mod freshness;
mod logger;
mod reload;
mod render;
mod utils;
mod workspace;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{
    Cli, Commands, ServeArgs,
    supervise::{ServeProcess, Supervisor, WorkspaceCleanup},
};
use config::PreviewConfig;
use core::{ExitMode, ShutdownHandle};
use std::sync::atomic::Ordering;
use workspace::Workspace;

fn main() {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            log!("error"; "{:#}", e);
            ExitMode::Error.code()
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let config = PreviewConfig::load(cli)?;
    let workspace = Workspace::new(config.root.clone());

    match cli.command() {
        Commands::Start { args } => start(cli, &args, workspace),
        Commands::Serve { args } => serve(&config, &args),
        Commands::Clean => cli::clean::clean_workspace(&workspace).map(|_| 0),
        Commands::List => cli::clean::list_documents(&workspace).map(|()| 0),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

fn serve(config: &PreviewConfig, args: &ServeArgs) -> Result<i32> {
    let shutdown = ShutdownHandle::new();
    core::setup_shutdown_handler(shutdown.clone())?;
    core::install_panic_hook(shutdown.clone());

    let mode = cli::serve::serve(config, args, &shutdown)?;
    Ok(mode.code())
}

// =============================================================================
// Start Command
// =============================================================================

/// Supervise `vitae serve` children with the same options.
fn start(cli: &Cli, args: &ServeArgs, workspace: Workspace) -> Result<i32> {
    let mut child_args = cli.global_args();
    child_args.push("serve".into());
    child_args.extend(args.to_args());

    let supervisor = Supervisor::new(
        ServeProcess::new(child_args)?,
        WorkspaceCleanup::new(workspace),
    );

    let interrupted = supervisor.interrupted();
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    supervisor.run()
}
