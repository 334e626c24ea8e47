//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Live preview server for HTML/CSS resumes
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Workspace root containing `resumes/` and `templates/` (default: current directory)
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Config file path, relative to the workspace root
    #[arg(short = 'C', long, global = true, default_value = "vitae.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands (default: start)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the preview server under a supervisor that restarts and cleans up
    #[command(visible_alias = "s")]
    Start {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Run the preview server directly (no restart loop, no cleanup)
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Delete generated PDFs, extracted text and the runtime cache
    #[command(visible_alias = "c")]
    Clean,

    /// List known documents
    #[command(visible_alias = "l")]
    List,
}

/// Shared arguments for Start and Serve commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// HTTP port number to listen on (localhost only)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Port for the live-reload event stream
    #[arg(short, long = "events-port")]
    pub events_port: Option<u16>,

    /// Enable file watching for live reload
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,

    /// Document to preview first (overrides the last active one)
    #[arg(short, long)]
    pub document: Option<String>,
}

impl ServeArgs {
    /// Re-encode as command-line arguments for a child `serve` process.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(port) = self.port {
            args.extend(["--port".into(), port.to_string().into()]);
        }
        if let Some(port) = self.events_port {
            args.extend(["--events-port".into(), port.to_string().into()]);
        }
        if let Some(watch) = self.watch {
            args.extend(["--watch".into(), watch.to_string().into()]);
        }
        if let Some(document) = &self.document {
            args.extend(["--document".into(), document.into()]);
        }
        args
    }
}

impl Cli {
    /// Effective command (`start` when omitted).
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start {
            args: ServeArgs::default(),
        })
    }

    /// Serve arguments of a `start`/`serve` invocation.
    pub fn serve_args(&self) -> Option<&ServeArgs> {
        match &self.command {
            Some(Commands::Start { args } | Commands::Serve { args }) => Some(args),
            _ => None,
        }
    }

    /// Global arguments forwarded to a child `serve` process.
    pub fn global_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(root) = &self.root {
            args.extend(["--root".into(), root.clone().into_os_string()]);
        }
        args.extend(["--config".into(), self.config.clone().into_os_string()]);
        if self.verbose {
            args.push("--verbose".into());
        }
        let color = match self.color {
            ColorChoice::Always => "always",
            ColorChoice::Never => "never",
            ColorChoice::Auto => "auto",
        };
        args.extend(["--color".into(), color.into()]);
        args
    }
}
