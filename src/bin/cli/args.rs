//! CLI Argument Structures
//!
//! Command and argument definitions of the `quale` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Revision-by-revision software quality indicators
#[derive(Parser)]
#[command(name = "quale")]
#[command(version = VERSION)]
#[command(about = "Quale - revision-by-revision software quality indicators")]
#[command(long_about = "
Run external static-analysis tools over every revision of a branch, turn their
output into 0.0-3.0 quality marks and track how each file evolves.

Common Usage:

  # Measure a branch from an exported checkout
  quale measure --history history.yml --checkout ./export

  # Check out each revision with git before measuring it
  quale measure --history history.yml --checkout ./repo \\
      --checkout-command 'git -C {root} checkout -q {revision}'

  # Continue an interrupted pass
  quale measure --history history.yml --checkout ./export --resume

  # Inspect the package table of a stored branch
  quale packages .quale/main.json
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Measure every unmeasured revision of a branch
    Measure(MeasureArgs),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Validate a quale configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),

    /// List the analysis tools and the metrics they provide
    #[command(name = "list-tools")]
    ListTools(ListToolsArgs),

    /// Print the nested-set package table of a stored branch
    Packages(PackagesArgs),
}

#[derive(Args)]
pub struct MeasureArgs {
    /// History file (JSON or YAML) listing the branch's revisions
    #[arg(long)]
    pub history: PathBuf,

    /// Directory holding the revision's files
    #[arg(long)]
    pub checkout: PathBuf,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for branch snapshots
    #[arg(short, long, default_value = ".quale")]
    pub out: PathBuf,

    /// Continue after the revisions already measured in the snapshot
    #[arg(long)]
    pub resume: bool,

    /// Command run before each revision; `{root}` and `{revision}` are substituted
    #[arg(long)]
    pub checkout_command: Option<String>,

    /// Override the work directory for descriptors and reports
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Keep descriptors and reports after parsing
    #[arg(long)]
    pub keep_reports: bool,
}

#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Path to configuration file to validate
    #[arg(short, long, required = true)]
    pub config: PathBuf,

    /// Show the calibration table
    #[arg(long)]
    pub detailed: bool,
}

#[derive(Args)]
pub struct ListToolsArgs {
    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct PackagesArgs {
    /// Snapshot written by `quale measure`
    pub snapshot: PathBuf,

    /// Aggregation base for package scores (defaults to the configured value)
    #[arg(long)]
    pub lambda: Option<f64>,
}
