//! Console rendering of measurement results and configuration.

use std::path::Path;

use owo_colors::OwoColorize;
use tabled::{settings::Style as TableStyle, Table, Tabled};

use quale_rs::adapters::build_adapters;
use quale_rs::core::config::{Curve, QualeConfig};
use quale_rs::core::model::{Branch, Language, MetricKind};
use quale_rs::PassSummary;

/// Print the outcome of a finished pass.
pub fn display_pass_summary(branch: &Branch, summary: &PassSummary, snapshot: &Path) {
    #[derive(Tabled)]
    struct SummaryRow {
        metric: String,
        value: String,
    }

    let rows = vec![
        SummaryRow {
            metric: "Branch".to_string(),
            value: branch.name.clone(),
        },
        SummaryRow {
            metric: "Revisions measured".to_string(),
            value: summary.revisions_measured.to_string(),
        },
        SummaryRow {
            metric: "Revisions already measured".to_string(),
            value: summary.revisions_skipped.to_string(),
        },
        SummaryRow {
            metric: "Files measured".to_string(),
            value: summary.files_measured.to_string(),
        },
        SummaryRow {
            metric: "Faulty files".to_string(),
            value: summary.files_faulty.to_string(),
        },
        SummaryRow {
            metric: "Packages".to_string(),
            value: branch.packages.len().to_string(),
        },
    ];

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    println!();
    println!(
        "{} {}",
        "💾 Snapshot written to".bold(),
        snapshot.display().to_string().cyan()
    );
}

/// Print the top-level configuration values.
pub fn display_config_summary(config: &QualeConfig) {
    #[derive(Tabled)]
    struct ConfigRow {
        setting: String,
        value: String,
    }

    let enabled: Vec<&str> = ["checkstyle", "jhawk", "complexity_report"]
        .into_iter()
        .filter(|name| config.tools.get(name).map_or(false, |tool| tool.enabled))
        .collect();

    let rows = vec![
        ConfigRow {
            setting: "Aggregation base (lambda)".to_string(),
            value: config.scoring.lambda.to_string(),
        },
        ConfigRow {
            setting: "Calibrated metrics".to_string(),
            value: config.scoring.thresholds.len().to_string(),
        },
        ConfigRow {
            setting: "Enabled tools".to_string(),
            value: enabled.join(", "),
        },
        ConfigRow {
            setting: "Work directory".to_string(),
            value: config.io.work_dir.display().to_string(),
        },
        ConfigRow {
            setting: "Ignored folders".to_string(),
            value: config.ingest.ignored_folders.len().to_string(),
        },
    ];

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
}

/// Print the calibration table.
pub fn display_thresholds(config: &QualeConfig) {
    #[derive(Tabled)]
    struct ThresholdRow {
        metric: String,
        low: String,
        high: String,
        curve: String,
    }

    let rows: Vec<ThresholdRow> = config
        .scoring
        .thresholds
        .iter()
        .map(|(kind, threshold)| ThresholdRow {
            metric: kind.label().to_string(),
            low: threshold.low.to_string(),
            high: threshold.high.to_string(),
            curve: match threshold.curve {
                Curve::Linear => "linear".to_string(),
                Curve::Exponential { reference, scale } => {
                    format!("exponential (reference {reference}, scale {scale})")
                }
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
}

/// Print every enabled adapter with its routing and metrics.
pub fn display_tools(config: &QualeConfig) -> anyhow::Result<()> {
    #[derive(Tabled)]
    struct ToolRow {
        tool: String,
        languages: String,
        executable: String,
        provides: String,
    }

    let adapters = build_adapters(&config.tools)?;
    let rows: Vec<ToolRow> = adapters
        .iter()
        .map(|adapter| ToolRow {
            tool: adapter.name().to_string(),
            languages: Language::ALL
                .into_iter()
                .filter(|language| adapter.accepts(*language))
                .map(Language::mime)
                .collect::<Vec<_>>()
                .join(", "),
            executable: config
                .tools
                .get(adapter.name())
                .map(|tool| tool.executable.clone())
                .unwrap_or_default(),
            provides: adapter
                .provides()
                .iter()
                .map(|kind| MetricKind::as_str(*kind))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    if rows.is_empty() {
        println!("{}", "⚠️  No analysis tool is enabled".yellow());
        return Ok(());
    }

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    Ok(())
}

/// Print the nested-set table with the aggregated score of each package.
pub fn display_packages(branch: &Branch, lambda: f64) -> anyhow::Result<()> {
    #[derive(Tabled)]
    struct PackageRow {
        package: String,
        left: u32,
        right: u32,
        score: String,
    }

    let scores = branch.packages.rollup(&branch.files, lambda)?;
    let mut rows: Vec<PackageRow> = branch
        .packages
        .rows()
        .into_iter()
        .map(|row| PackageRow {
            score: scores
                .get(&row.name)
                .map(|score| format!("{score:.2}"))
                .unwrap_or_else(|| "-".to_string()),
            package: row.name,
            left: row.left,
            right: row.right,
        })
        .collect();
    rows.sort_by_key(|row| row.left);

    println!(
        "{} {}",
        "📦 Packages of".bright_blue().bold(),
        branch.name.cyan()
    );
    println!();
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    Ok(())
}
