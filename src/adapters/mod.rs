//! External analysis tool adapters.
//!
//! Every adapter drives one third-party analyzer through the same
//! `configure -> run -> parse` contract. The variants differ only in how
//! they split their input:
//!
//! - [`CheckstyleAdapter`]: a single invocation over every file
//! - [`JHawkAdapter`]: fixed-size chunks, one descriptor/report pair each
//! - [`ComplexityReportAdapter`]: one invocation per file
//!
//! Adapters never share state. A `parse` without a preceding `run` yields
//! an empty [`ToolOutput`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::errors::{QualeError, Result};
use crate::core::model::{FileId, Language, Measure, MetricKind};

pub mod checkstyle;
pub mod complexity_report;
pub mod jhawk;
pub mod process;
pub mod registry;
pub mod templates;
pub mod xml;

pub use checkstyle::CheckstyleAdapter;
pub use complexity_report::ComplexityReportAdapter;
pub use jhawk::JHawkAdapter;
pub use registry::build_adapters;

/// A file submitted to the adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Record the measures belong to
    pub id: FileId,
    /// Path relative to the checkout root, `/`-separated
    pub path: String,
    /// Classification used to route the file to adapters
    pub language: Language,
}

impl SourceFile {
    /// Location of the file inside `checkout_root`.
    pub fn absolute_path(&self, checkout_root: &Path) -> PathBuf {
        checkout_root.join(&self.path)
    }
}

/// Where the current revision lives and where adapters may write.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identifier of the revision being measured
    pub revision: String,
    /// Directory holding the revision's files
    pub checkout_root: PathBuf,
    /// Directory for descriptors and reports
    pub work_dir: PathBuf,
}

impl RunContext {
    /// Per-adapter scratch directory, created on demand.
    pub fn tool_dir(&self, tool: &str) -> Result<PathBuf> {
        let dir = self.work_dir.join(tool);
        std::fs::create_dir_all(&dir).map_err(|e| {
            QualeError::io(format!("Failed to create work directory {}", dir.display()), e)
        })?;
        Ok(dir)
    }

    /// File name safe version of the revision identifier.
    pub fn revision_stem(&self) -> String {
        self.revision
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

/// Raw measures produced by one adapter for one revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Measures keyed by path relative to the checkout root
    pub measures: BTreeMap<String, Vec<Measure>>,
    /// Files the tool rejected with a recognized per-file failure
    pub soft_failed: BTreeSet<String>,
}

impl ToolOutput {
    /// Whether nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty() && self.soft_failed.is_empty()
    }

    /// Append measures for `path`.
    pub fn extend(&mut self, path: impl Into<String>, measures: impl IntoIterator<Item = Measure>) {
        let entry = self.measures.entry(path.into()).or_default();
        entry.extend(measures);
    }

    /// Combine two outputs. Measures for the same path are concatenated.
    pub fn merge(mut self, other: ToolOutput) -> ToolOutput {
        for (path, measures) in other.measures {
            self.extend(path, measures);
        }
        self.soft_failed.extend(other.soft_failed);
        self
    }

    /// Drop every measure whose kind is not in `provides`.
    pub fn retain_kinds(&mut self, provides: &[MetricKind]) {
        for measures in self.measures.values_mut() {
            measures.retain(|measure| provides.contains(&measure.kind));
        }
        self.measures.retain(|_, measures| !measures.is_empty());
    }
}

/// Contract shared by every analysis tool.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Stable adapter name, used for work directories and diagnostics
    fn name(&self) -> &str;

    /// Whether files of `language` are routed to this adapter
    fn accepts(&self, language: Language) -> bool;

    /// Metric kinds this adapter is authoritative for
    fn provides(&self) -> &[MetricKind];

    /// Prepare the control artifacts for `files`, discarding any previous state
    fn configure(&mut self, files: &[SourceFile], ctx: &RunContext) -> Result<()>;

    /// Execute the configured work. Cancellation is honored between invocations.
    async fn run(&mut self, cancel: &CancellationToken) -> Result<()>;

    /// Read the reports of the last `run`. A second call returns nothing.
    fn parse(&mut self, ctx: &RunContext) -> Result<ToolOutput>;
}

/// Split `items` into consecutive chunks of at most `batch_size`.
pub fn plan_batches<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.max(1)).collect()
}

/// `sum / count` over sub-units, `None` when there are none.
pub fn sub_unit_average<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Stable short identifier for a path, used to name per-file reports.
pub fn path_digest(path: &str) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(path.as_bytes()))
}

/// Substitute argument placeholders.
pub fn expand_args(args: &[String], values: &[(&str, String)]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            values
                .iter()
                .fold(arg.clone(), |acc, (placeholder, value)| acc.replace(placeholder, value))
        })
        .collect()
}

/// Map a tool-reported path onto a submitted file.
///
/// Tools may report absolute paths, paths relative to the checkout root or
/// paths relative to some source folder; the match is made on whole path
/// segments.
pub fn resolve_reported_path<'a>(
    reported: &str,
    checkout_root: &Path,
    files: &'a [SourceFile],
) -> Option<&'a SourceFile> {
    let relative = xml::relative_to_root(reported, checkout_root);
    files
        .iter()
        .find(|file| file.path == relative)
        .or_else(|| {
            files
                .iter()
                .find(|file| crate::core::model::has_path_suffix(&file.path, &relative))
        })
}
