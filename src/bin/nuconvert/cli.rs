//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;

use nuconvert::util::shell::ColorChoice;

/// nuconvert - Migrate NuGet packages.config repositories to Paket
#[derive(Parser)]
#[command(name = "nuconvert")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_name = "WHEN")]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a NuGet repository to Paket
    Convert(ConvertArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Repository root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Target manifest, relative to the root
    #[arg(long, value_name = "FILE")]
    pub dependencies: Option<PathBuf>,

    /// Convert even if paket.dependencies or paket.references already exist
    #[arg(long, short)]
    pub force: bool,

    /// How to migrate feed credentials: encrypt, plaintext, selective
    #[arg(long, value_name = "MODE", env = "NUCONVERT_CREDENTIALS")]
    pub credentials: Option<String>,

    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Keep packages.config, NuGet.exe and NuGet.targets
    #[arg(long)]
    pub keep_legacy_files: bool,

    /// Ignore the user-level NuGet.Config
    #[arg(long)]
    pub no_user_config: bool,

    /// Skip directories with this name while scanning (repeatable)
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: CompletionShell,
}
