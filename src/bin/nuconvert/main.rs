//! nuconvert CLI - Migrate NuGet packages.config repositories to Paket

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use nuconvert::util::Shell;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("nuconvert=debug")
    } else if cli.quiet {
        EnvFilter::new("nuconvert=error")
    } else {
        EnvFilter::new("nuconvert=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color);

    // Execute command
    match cli.command {
        Commands::Convert(args) => commands::convert::execute(args, &shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
