//! Command execution for the `quale` binary.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use quale_rs::core::config::QualeConfig;
use quale_rs::core::ingest::Ingestor;
use quale_rs::core::pipeline::{MeasurementPass, PassMode, ProgressCallback};
use quale_rs::io::{load_history, Checkout, CommandCheckout, JsonStore, StaticCheckout};

use super::args::{ListToolsArgs, MeasureArgs, PackagesArgs, ValidateConfigArgs};
use super::output::{
    display_config_summary, display_packages, display_pass_summary, display_thresholds,
    display_tools,
};

/// Load a configuration file, or the defaults when none is given.
pub fn load_configuration(path: Option<&Path>) -> anyhow::Result<QualeConfig> {
    let config = match path {
        Some(path) => QualeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => QualeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Measure a branch described by a history file.
pub async fn measure_command(args: MeasureArgs) -> anyhow::Result<()> {
    let mut config = load_configuration(args.config.as_deref())?;
    if let Some(work_dir) = &args.work_dir {
        config.io.work_dir = work_dir.clone();
    }
    config.io.keep_reports |= args.keep_reports;

    if !args.checkout.is_dir() {
        anyhow::bail!("Checkout directory does not exist: {}", args.checkout.display());
    }

    let history = load_history(&args.history)?;
    let ingested = Ingestor::new(&config.ingest)?.ingest(&history)?;
    let snapshot = JsonStore::path_for(&args.out, &ingested.name);

    let (mut branch, mode) = if args.resume && snapshot.exists() {
        let stored = JsonStore::load(&snapshot)?;
        let stored_ids: Vec<&str> = stored.revisions.iter().map(|r| r.identifier.as_str()).collect();
        let history_ids: Vec<&str> = ingested.revisions.iter().map(|r| r.identifier.as_str()).collect();
        if stored.name != ingested.name || stored_ids != history_ids {
            anyhow::bail!(
                "Snapshot {} does not match the history; measure without --resume",
                snapshot.display()
            );
        }
        let after = stored
            .last_measured_revision()
            .map(|index| format!(" after {}", stored.revisions[index].identifier))
            .unwrap_or_default();
        println!(
            "{} {} of {} revisions already measured{}",
            "↻ Resuming:".bright_blue().bold(),
            stored.measured_count(),
            stored.revisions.len(),
            after
        );
        (stored, PassMode::Resume)
    } else {
        if args.resume {
            warn!(snapshot = %snapshot.display(), "No snapshot to resume from, starting fresh");
        }
        (ingested, PassMode::Fresh)
    };

    let checkout: Arc<dyn Checkout> = match &args.checkout_command {
        Some(template) => Arc::new(CommandCheckout::new(&args.checkout, template)?),
        None => Arc::new(StaticCheckout::new(&args.checkout)),
    };

    let total = branch.revisions.len() as u64;
    let progress_bar = ProgressBar::new(total);
    progress_bar.set_style(ProgressStyle::with_template(
        "📐 {msg} [{bar:40.bright_blue/blue}] {pos}/{len} {elapsed_precise}",
    )?);
    progress_bar.set_position(branch.measured_count() as u64);
    let progress: ProgressCallback = Box::new({
        let pb = progress_bar.clone();
        move |revision: &str, fraction: f64| {
            pb.set_message(revision.to_string());
            pb.set_position((fraction * total as f64).round() as u64);
        }
    });

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let mut pass = MeasurementPass::new(config, checkout)?
        .with_cancellation(cancel)
        .with_progress(progress);
    let mut store = JsonStore::new(&snapshot);

    info!(branch = %branch.name, revisions = total, "Measuring branch");
    let result = pass.run(&mut branch, &mut store, mode).await;
    progress_bar.finish_and_clear();

    match result {
        Ok(summary) => {
            println!("{}", "✅ Measurement complete".bright_green().bold());
            println!();
            display_pass_summary(&branch, &summary, &snapshot);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "❌ Measurement failed:".red(), e);
            eprintln!();
            eprintln!(
                "{}",
                "💡 Fix the cause and rerun with --resume to continue".dimmed()
            );
            Err(e.into())
        }
    }
}

/// Print the default configuration as YAML.
pub fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default quale configuration".dimmed());
    println!("{}", "# Save this to a file and customize as needed".dimmed());
    println!("{}", "# Usage: quale measure --config your-config.yml ...".dimmed());
    println!();

    let yaml_output = serde_yaml::to_string(&QualeConfig::default())?;
    println!("{}", yaml_output);
    Ok(())
}

/// Validate a configuration file.
pub fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "🔍 Validating configuration:".bright_blue().bold(),
        args.config.display().to_string().cyan()
    );
    println!();

    let config = match load_configuration(Some(&args.config)) {
        Ok(config) => {
            println!("{}", "✅ Configuration file is valid!".bright_green().bold());
            println!();
            config
        }
        Err(e) => {
            eprintln!("{} {:#}", "❌ Configuration validation failed:".red(), e);
            eprintln!();
            eprintln!(
                "{}",
                "💡 Tip: Use 'quale print-default-config' to see valid format".dimmed()
            );
            return Err(e);
        }
    };

    display_config_summary(&config);
    if args.detailed {
        println!();
        println!("{}", "🔧 Calibration".bright_blue().bold());
        println!();
        display_thresholds(&config);
    }
    Ok(())
}

/// List the enabled analysis tools.
pub fn list_tools(args: ListToolsArgs) -> anyhow::Result<()> {
    let config = load_configuration(args.config.as_deref())?;
    println!("{}", "🔧 Analysis Tools".bright_blue().bold());
    println!();
    display_tools(&config)
}

/// Print the package table of a stored branch.
pub fn packages_command(args: PackagesArgs) -> anyhow::Result<()> {
    let branch = JsonStore::load(&args.snapshot)?;
    let lambda = args
        .lambda
        .unwrap_or_else(|| QualeConfig::default().scoring.lambda);
    if !(lambda > 1.0) {
        anyhow::bail!("lambda must be greater than 1, got {lambda}");
    }
    display_packages(&branch, lambda)
}
