//! complexity-report (`cr`), run once per JavaScript file.
//!
//! One invocation per file isolates syntax errors: `cr` exits with a
//! message starting with `Fatal error` when it cannot parse its input, and
//! that file is recorded as soft-failed while the rest of the revision
//! continues.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::process::execute;
use super::{
    expand_args, path_digest, sub_unit_average, RunContext, SourceFile, ToolAdapter, ToolOutput,
};
use crate::core::config::ToolConfig;
use crate::core::errors::{QualeError, Result};
use crate::core::model::{Language, Measure, MetricKind};

/// Marker `cr` prints when the input does not parse.
pub const SOFT_FAILURE_MARKER: &str = "Fatal error";

#[derive(Debug, Default, Deserialize)]
struct CrDocument {
    #[serde(default)]
    reports: Vec<CrReport>,
}

#[derive(Debug, Default, Deserialize)]
struct CrReport {
    #[serde(default)]
    functions: Vec<CrFunction>,
    #[serde(default)]
    aggregate: Option<CrAggregate>,
}

#[derive(Debug, Deserialize)]
struct CrFunction {
    cyclomatic: f64,
}

#[derive(Debug, Default, Deserialize)]
struct CrAggregate {
    #[serde(default)]
    halstead: Option<CrHalstead>,
    #[serde(default)]
    sloc: Option<CrSloc>,
}

#[derive(Debug, Default, Deserialize)]
struct CrHalstead {
    volume: Option<f64>,
    difficulty: Option<f64>,
    effort: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrSloc {
    logical: Option<f64>,
}

/// Measures contained in one `cr` JSON report.
///
/// Files without functions yield nothing.
pub fn report_measures(contents: &str) -> std::result::Result<Vec<Measure>, serde_json::Error> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Option<CrDocument> = serde_json::from_str(contents)?;
    let Some(report) = document.and_then(|doc| doc.reports.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let Some(complexity) = sub_unit_average(report.functions.iter().map(|f| f.cyclomatic)) else {
        return Ok(Vec::new());
    };

    let mut measures = vec![Measure::new(MetricKind::CyclomaticComplexity, complexity)];
    if let Some(aggregate) = report.aggregate {
        if let Some(halstead) = aggregate.halstead {
            for (value, kind) in [
                (halstead.volume, MetricKind::HalsteadVolume),
                (halstead.difficulty, MetricKind::HalsteadDifficulty),
                (halstead.effort, MetricKind::HalsteadEffort),
            ] {
                if let Some(value) = value {
                    measures.push(Measure::new(kind, value));
                }
            }
        }
        if let Some(logical) = aggregate.sloc.and_then(|sloc| sloc.logical) {
            measures.push(Measure::new(MetricKind::Sloc, logical));
        }
    }
    Ok(measures)
}

#[derive(Debug, Clone)]
struct FileJob {
    path: String,
    input: PathBuf,
    report: PathBuf,
}

/// Per-file adapter.
#[derive(Debug)]
pub struct ComplexityReportAdapter {
    config: ToolConfig,
    revision: String,
    base: PathBuf,
    pending: Vec<FileJob>,
    completed: Vec<FileJob>,
    soft_failed: Vec<String>,
}

impl ComplexityReportAdapter {
    /// Adapter name.
    pub const NAME: &'static str = "complexity_report";

    /// Create the adapter from its configuration entry.
    pub fn new(config: ToolConfig) -> Self {
        Self {
            config,
            revision: String::new(),
            base: PathBuf::new(),
            pending: Vec::new(),
            completed: Vec::new(),
            soft_failed: Vec::new(),
        }
    }

    fn parse_job(&self, job: &FileJob) -> Result<Vec<Measure>> {
        let contents = read_json_report(&job.report)?;
        report_measures(&contents).map_err(|e| {
            QualeError::report(Self::NAME, job.report.display().to_string(), e.to_string())
        })
    }
}

fn read_json_report(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        QualeError::report(
            ComplexityReportAdapter::NAME,
            path.display().to_string(),
            format!("cannot read report: {e}"),
        )
    })
}

#[async_trait]
impl ToolAdapter for ComplexityReportAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accepts(&self, language: Language) -> bool {
        language == Language::JavaScript
    }

    fn provides(&self) -> &[MetricKind] {
        &self.config.provides
    }

    fn configure(&mut self, files: &[SourceFile], ctx: &RunContext) -> Result<()> {
        self.pending.clear();
        self.completed.clear();
        self.soft_failed.clear();
        self.revision = ctx.revision.clone();
        self.base = ctx.checkout_root.clone();
        if files.is_empty() {
            return Ok(());
        }

        let dir = ctx.tool_dir(Self::NAME)?;
        let stem = ctx.revision_stem();
        self.pending = files
            .iter()
            .map(|file| FileJob {
                path: file.path.clone(),
                input: file.absolute_path(&ctx.checkout_root),
                report: dir.join(format!("{stem}_{}.json", path_digest(&file.path))),
            })
            .collect();
        debug!(files = files.len(), "Configured complexity_report");
        Ok(())
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        let jobs = std::mem::take(&mut self.pending);
        let total = jobs.len();

        for (index, job) in jobs.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(QualeError::cancelled(format!(
                    "{} file {}/{}",
                    Self::NAME,
                    index + 1,
                    total
                )));
            }

            let args = expand_args(
                &self.config.args,
                &[
                    ("{descriptor}", job.report.display().to_string()),
                    ("{report}", job.report.display().to_string()),
                    ("{input}", job.input.display().to_string()),
                    ("{base}", self.base.display().to_string()),
                    ("{revision}", self.revision.clone()),
                ],
            );

            match execute(Self::NAME, &self.config.executable, &args, Some(&self.base)).await {
                Ok(_) => self.completed.push(job),
                Err(err)
                    if err
                        .execution_failure()
                        .map_or(false, |failure| failure.starts_with(SOFT_FAILURE_MARKER)) =>
                {
                    warn!(file = %job.path, revision = %self.revision, "complexity-report could not parse file");
                    self.soft_failed.push(job.path);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn parse(&mut self, _ctx: &RunContext) -> Result<ToolOutput> {
        let completed = std::mem::take(&mut self.completed);
        let mut output = ToolOutput::default();
        output.soft_failed.extend(std::mem::take(&mut self.soft_failed));

        for job in &completed {
            let measures = self.parse_job(job)?;
            if !measures.is_empty() {
                output.extend(job.path.clone(), measures);
            }
        }

        output.retain_kinds(&self.config.provides);
        Ok(output)
    }
}
