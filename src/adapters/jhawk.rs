//! JHawk, run over fixed-size chunks of Java files.
//!
//! JHawk reports are large, so the input is split into chunks with one
//! descriptor/report pair each. A file belongs to exactly one chunk and
//! only classes that map onto that chunk's files are read back.
//!
//! ```text
//! <Package><Name>com.acme</Name>
//!   <Class><ClassName>Foo</ClassName>
//!     <Metrics><halsteadCumulativeVolume>..</halsteadCumulativeVolume>
//!              <halsteadEffort>..</halsteadEffort></Metrics>
//!     <Method><Metrics><cyclomaticComplexity>3</cyclomaticComplexity></Metrics></Method>
//!   </Class>
//! </Package>
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::process::execute;
use super::templates::{DescriptorTemplate, JobDescriptor, JHAWK_JOB};
use super::xml::{read_report, XmlElement};
use super::{
    expand_args, plan_batches, sub_unit_average, RunContext, SourceFile, ToolAdapter, ToolOutput,
};
use crate::core::config::{ToolConfig, ToolsConfig};
use crate::core::errors::{QualeError, Result};
use crate::core::model::{has_path_suffix, join_path, Language, Measure, MetricKind};

#[derive(Debug, Clone)]
struct Chunk {
    descriptor: PathBuf,
    report: PathBuf,
    files: Vec<SourceFile>,
}

/// Chunked adapter.
#[derive(Debug)]
pub struct JHawkAdapter {
    config: ToolConfig,
    template: DescriptorTemplate,
    revision: String,
    base: PathBuf,
    pending: Vec<Chunk>,
    completed: Vec<Chunk>,
}

fn number(element: &XmlElement, name: &str) -> Option<f64> {
    element.child_text(name)?.trim().parse().ok()
}

/// Measures of one `<Class>` element.
pub fn class_measures(class: &XmlElement) -> Vec<Measure> {
    let mut measures = Vec::new();

    if let Some(metrics) = class.child("Metrics") {
        let volume = number(metrics, "halsteadCumulativeVolume");
        let effort = number(metrics, "halsteadEffort");
        if let Some(volume) = volume {
            measures.push(Measure::new(MetricKind::HalsteadVolume, volume));
        }
        if let Some(effort) = effort {
            measures.push(Measure::new(MetricKind::HalsteadEffort, effort));
        }
        if let (Some(volume), Some(effort)) = (volume, effort) {
            if volume > 0.0 {
                measures.push(Measure::new(MetricKind::HalsteadDifficulty, effort / volume));
            }
        }

        for (tag, kind) in [
            ("fanIn", MetricKind::FanIn),
            ("fanOut", MetricKind::FanOut),
            ("loc", MetricKind::Sloc),
        ] {
            if let Some(value) = number(metrics, tag) {
                measures.push(Measure::new(kind, value));
            }
        }
    }

    let complexities = class.descendants("Method").into_iter().filter_map(|method| {
        method
            .child("Metrics")
            .and_then(|metrics| number(metrics, "cyclomaticComplexity"))
    });
    if let Some(average) = sub_unit_average(complexities) {
        measures.push(Measure::new(MetricKind::CyclomaticComplexity, average));
    }

    measures
}

impl JHawkAdapter {
    /// Adapter name.
    pub const NAME: &'static str = "jhawk";

    /// Create the adapter from its configuration entry.
    pub fn new(config: ToolConfig) -> Result<Self> {
        let template = DescriptorTemplate::load(Self::NAME, JHAWK_JOB, config.template.as_deref())?;
        Ok(Self {
            config,
            template,
            revision: String::new(),
            base: PathBuf::new(),
            pending: Vec::new(),
            completed: Vec::new(),
        })
    }

    /// Files per invocation.
    pub fn batch_size(&self) -> usize {
        self.config
            .batch_size
            .unwrap_or(ToolsConfig::DEFAULT_BATCH_SIZE)
    }

    /// Number of chunks waiting for `run`.
    pub fn pending_chunks(&self) -> usize {
        self.pending.len()
    }

    fn parse_chunk(&self, chunk: &Chunk) -> Result<ToolOutput> {
        let document = read_report(Self::NAME, &chunk.report)?;
        let mut output = ToolOutput::default();

        for package in document.descendants("Package") {
            let package_path = package.child_text("Name").unwrap_or("").replace('.', "/");

            for class in package.descendants("Class") {
                let Some(class_name) = class.child_text("ClassName") else {
                    continue;
                };
                // Inner and anonymous classes are folded into their outer class.
                if class_name.contains('$') {
                    continue;
                }

                let reported = join_path(&package_path, &format!("{class_name}.java"));
                let Some(file) = chunk
                    .files
                    .iter()
                    .find(|file| has_path_suffix(&file.path, &reported))
                else {
                    continue;
                };

                let measures = class_measures(class);
                if !measures.is_empty() {
                    output.extend(file.path.clone(), measures);
                }
            }
        }

        output.retain_kinds(&self.config.provides);
        Ok(output)
    }
}

#[async_trait]
impl ToolAdapter for JHawkAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accepts(&self, language: Language) -> bool {
        language == Language::Java
    }

    fn provides(&self) -> &[MetricKind] {
        &self.config.provides
    }

    fn configure(&mut self, files: &[SourceFile], ctx: &RunContext) -> Result<()> {
        self.pending.clear();
        self.completed.clear();
        self.revision = ctx.revision.clone();
        self.base = ctx.checkout_root.clone();
        if files.is_empty() {
            return Ok(());
        }

        let dir = ctx.tool_dir(Self::NAME)?;
        let stem = ctx.revision_stem();
        for (index, batch) in plan_batches(files, self.batch_size()).into_iter().enumerate() {
            let descriptor = dir.join(format!("{stem}-{index}.xml"));
            let report = dir.join(format!("{stem}-{index}-report.xml"));

            self.template.render_to(
                &JobDescriptor {
                    tool: Self::NAME.to_string(),
                    revision: ctx.revision.clone(),
                    base_path: ctx.checkout_root.display().to_string(),
                    target: report.display().to_string(),
                    rules: None,
                    files: batch
                        .iter()
                        .map(|file| file.absolute_path(&ctx.checkout_root).display().to_string())
                        .collect(),
                },
                &descriptor,
            )?;

            self.pending.push(Chunk {
                descriptor,
                report,
                files: batch.to_vec(),
            });
        }
        debug!(
            files = files.len(),
            chunks = self.pending.len(),
            batch_size = self.batch_size(),
            "Configured jhawk"
        );
        Ok(())
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        let chunks = std::mem::take(&mut self.pending);
        let total = chunks.len();

        for (index, chunk) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(QualeError::cancelled(format!(
                    "{} batch {}/{}",
                    Self::NAME,
                    index + 1,
                    total
                )));
            }

            let args = expand_args(
                &self.config.args,
                &[
                    ("{descriptor}", chunk.descriptor.display().to_string()),
                    ("{report}", chunk.report.display().to_string()),
                    ("{base}", self.base.display().to_string()),
                    ("{revision}", self.revision.clone()),
                    ("{input}", self.base.display().to_string()),
                ],
            );
            execute(Self::NAME, &self.config.executable, &args, Some(&self.base)).await?;
            debug!(batch = index + 1, total, files = chunk.files.len(), "JHawk batch finished");

            self.completed.push(chunk);
        }

        if total > 0 {
            info!(revision = %self.revision, batches = total, "JHawk finished");
        }
        Ok(())
    }

    fn parse(&mut self, _ctx: &RunContext) -> Result<ToolOutput> {
        let completed = std::mem::take(&mut self.completed);
        completed
            .iter()
            .try_fold(ToolOutput::default(), |merged, chunk| {
                Ok(merged.merge(self.parse_chunk(chunk)?))
            })
    }
}
