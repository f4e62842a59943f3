use anyhow::Result;
use clap::{ColorChoice, Parser};
use flint_runner::cli::{self, Cli, Commands};
use flint_runner::config::{FlintConfig, init_config};
use flint_runner::{core, logger};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = init_config(FlintConfig::load(cli)?);

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve(),
        Commands::Scan { paths } => cli::scan::scan_files(paths, &config),
        Commands::Bundle => cli::bundle::bundle(&config),
    }
}
