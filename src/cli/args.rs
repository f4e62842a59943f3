//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Live-development runner for flint apps
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: flint.toml)
    #[arg(short = 'C', long, default_value = "flint.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Source directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Compiled output directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Watch sources, install imported packages and push changes to pages
    #[command(visible_alias = "s")]
    Serve {
        /// WebSocket port for connected pages
        #[arg(long)]
        ws_port: Option<u16>,

        /// Enable file watching
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Scan files once, install what they import and bundle
    #[command(visible_alias = "c")]
    Scan {
        /// Files or directories to scan. If omitted, scans every source.
        /// Use `-` to read paths from stdin.
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Regenerate the package manifest, loader and bundle
    #[command(visible_alias = "b")]
    Bundle,
}
