//! Quale CLI - revision-by-revision software quality indicators.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Measure(args) => cli::measure_command(args).await?,
        Commands::PrintDefaultConfig => cli::print_default_config()?,
        Commands::ValidateConfig(args) => cli::validate_config(args)?,
        Commands::ListTools(args) => cli::list_tools(args)?,
        Commands::Packages(args) => cli::packages_command(args)?,
    }

    Ok(())
}
