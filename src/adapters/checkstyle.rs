//! Checkstyle metric checks, run once over every Java file of a revision.
//!
//! The rule set caps every metric at zero, so each measured value shows up
//! as a violation whose message carries the number. NCSS is capped for
//! whole files only and is read from the file-level message:
//!
//! ```text
//! <file name="/repo/src/A.java">
//!   <error source="com.puppycrawl.tools.checkstyle.checks.metrics.JavaNCSSCheck"
//!          message="NCSS for this file is 42 (max allowed is 0)."/>
//! </file>
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::process::execute;
use super::templates::{DescriptorTemplate, JobDescriptor, CHECKSTYLE_JOB, CHECKSTYLE_RULES};
use super::xml::{read_report, relative_to_root};
use super::{expand_args, sub_unit_average, RunContext, SourceFile, ToolAdapter, ToolOutput};
use crate::core::config::ToolConfig;
use crate::core::errors::{QualeError, Result};
use crate::core::model::{Language, Measure, MetricKind};

/// Map a violation source such as
/// `com.puppycrawl.tools.checkstyle.checks.metrics.JavaNCSSCheck` onto a metric kind.
pub fn kind_for_source(source: &str) -> Option<MetricKind> {
    let check = source.rsplit('.').next().unwrap_or(source);
    let check = check.strip_suffix("Check").unwrap_or(check);
    match check {
        "ClassFanOutComplexity" => Some(MetricKind::FanOut),
        "ClassDataAbstractionCoupling" => Some(MetricKind::FanIn),
        "JavaNCSS" => Some(MetricKind::Sloc),
        "CyclomaticComplexity" => Some(MetricKind::CyclomaticComplexity),
        _ => None,
    }
}

/// Whether a violation measures the whole file.
///
/// JavaNCSS reports methods, classes and files under one source; only the
/// file count is a per-file SLOC. Other checks are averaged over sub-units.
pub fn is_file_level(kind: MetricKind, message: &str) -> bool {
    kind != MetricKind::Sloc || message.contains("for this file")
}

/// First number following ` is ` in a violation message.
pub fn value_from_message(message: &str) -> Option<f64> {
    let (_, tail) = message.split_once(" is ")?;
    let number: String = tail
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    number.trim_end_matches('.').parse().ok()
}

#[derive(Debug)]
struct Job {
    descriptor: PathBuf,
    report: PathBuf,
    revision: String,
    base: PathBuf,
}

/// Single-invocation adapter.
#[derive(Debug)]
pub struct CheckstyleAdapter {
    config: ToolConfig,
    job_template: DescriptorTemplate,
    rules_template: DescriptorTemplate,
    job: Option<Job>,
    pending_report: Option<PathBuf>,
}

impl CheckstyleAdapter {
    /// Adapter name.
    pub const NAME: &'static str = "checkstyle";

    /// Create the adapter from its configuration entry.
    pub fn new(config: ToolConfig) -> Result<Self> {
        let job_template =
            DescriptorTemplate::load(Self::NAME, CHECKSTYLE_JOB, config.template.as_deref())?;
        let rules_template = DescriptorTemplate::load("checkstyle-rules", CHECKSTYLE_RULES, None)?;
        Ok(Self {
            config,
            job_template,
            rules_template,
            job: None,
            pending_report: None,
        })
    }

    fn parse_report(&self, report: &Path, ctx: &RunContext) -> Result<ToolOutput> {
        let document = read_report(Self::NAME, report)?;
        let mut output = ToolOutput::default();

        for file in document.descendants("file") {
            let Some(name) = file.attr("name") else {
                continue;
            };
            let path = relative_to_root(name, &ctx.checkout_root);

            let mut values: BTreeMap<MetricKind, Vec<f64>> = BTreeMap::new();
            for violation in file.descendants("error") {
                let kind = violation.attr("source").and_then(kind_for_source);
                let message = violation.attr("message").unwrap_or_default();
                let Some(kind) = kind.filter(|kind| is_file_level(*kind, message)) else {
                    continue;
                };
                if let Some(value) = value_from_message(message) {
                    values.entry(kind).or_default().push(value);
                }
            }

            let measures: Vec<Measure> = values
                .into_iter()
                .filter_map(|(kind, values)| {
                    sub_unit_average(values).map(|value| Measure::new(kind, value))
                })
                .collect();
            if !measures.is_empty() {
                output.extend(path, measures);
            }
        }

        output.retain_kinds(&self.config.provides);
        Ok(output)
    }
}

#[async_trait]
impl ToolAdapter for CheckstyleAdapter {
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
        self.job = None;
        self.pending_report = None;
        if files.is_empty() {
            return Ok(());
        }

        let dir = ctx.tool_dir(Self::NAME)?;
        let stem = ctx.revision_stem();
        let descriptor = dir.join(format!("{stem}.xml"));
        let report = dir.join(format!("{stem}-report.xml"));
        let rules = dir.join("rules.xml");

        self.rules_template.render_to(&serde_json::json!({}), &rules)?;
        self.job_template.render_to(
            &JobDescriptor {
                tool: Self::NAME.to_string(),
                revision: ctx.revision.clone(),
                base_path: ctx.checkout_root.display().to_string(),
                target: report.display().to_string(),
                rules: Some(rules.display().to_string()),
                files: files
                    .iter()
                    .map(|file| file.absolute_path(&ctx.checkout_root).display().to_string())
                    .collect(),
            },
            &descriptor,
        )?;
        debug!(files = files.len(), descriptor = %descriptor.display(), "Configured checkstyle");

        self.job = Some(Job {
            descriptor,
            report,
            revision: ctx.revision.clone(),
            base: ctx.checkout_root.clone(),
        });
        Ok(())
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        // A configuration is consumed by the first run.
        let Some(job) = self.job.take() else {
            return Ok(());
        };
        if cancel.is_cancelled() {
            return Err(QualeError::cancelled(format!("{} run", Self::NAME)));
        }

        let args = expand_args(
            &self.config.args,
            &[
                ("{descriptor}", job.descriptor.display().to_string()),
                ("{report}", job.report.display().to_string()),
                ("{base}", job.base.display().to_string()),
                ("{revision}", job.revision.clone()),
                ("{input}", job.base.display().to_string()),
            ],
        );
        execute(Self::NAME, &self.config.executable, &args, Some(&job.base)).await?;
        info!(revision = %job.revision, "Checkstyle finished");

        self.pending_report = Some(job.report);
        Ok(())
    }

    fn parse(&mut self, ctx: &RunContext) -> Result<ToolOutput> {
        let Some(report) = self.pending_report.take() else {
            return Ok(ToolOutput::default());
        };
        self.parse_report(&report, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ToolsConfig;
    use crate::core::model::FileId;

    const SOURCE_PREFIX: &str = "com.puppycrawl.tools.checkstyle.checks.metrics.";

    #[test]
    fn test_kind_for_source() {
        assert_eq!(
            kind_for_source("com.puppycrawl.tools.checkstyle.checks.metrics.ClassFanOutComplexityCheck"),
            Some(MetricKind::FanOut)
        );
        assert_eq!(
            kind_for_source("com.puppycrawl.tools.checkstyle.checks.metrics.JavaNCSSCheck"),
            Some(MetricKind::Sloc)
        );
        assert_eq!(kind_for_source("CyclomaticComplexity"), Some(MetricKind::CyclomaticComplexity));
        assert_eq!(
            kind_for_source("com.puppycrawl.tools.checkstyle.checks.metrics.NPathComplexityCheck"),
            None
        );
    }

    #[test]
    fn test_value_from_message() {
        assert_eq!(value_from_message("NCSS for this file is 42 (max allowed is 0)."), Some(42.0));
        assert_eq!(
            value_from_message("Class Fan-Out Complexity is 1,234 (max allowed is 0)."),
            Some(1234.0)
        );
        assert_eq!(value_from_message("Cyclomatic Complexity is 3."), Some(3.0));
        assert_eq!(value_from_message("no number here"), None);
    }

    fn adapter() -> CheckstyleAdapter {
        CheckstyleAdapter::new(ToolsConfig::default().checkstyle).expect("adapter")
    }

    fn context(root: &std::path::Path, work: &std::path::Path) -> RunContext {
        RunContext {
            revision: "r1".to_string(),
            checkout_root: root.to_path_buf(),
            work_dir: work.to_path_buf(),
        }
    }

    #[test]
    fn test_parse_averages_per_kind_and_drops_unprovided() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().join("repo");
        let ctx = context(&root, &dir.path().join("work"));
        let report = dir.path().join("report.xml");
        std::fs::write(
            &report,
            format!(
                r#"<?xml version="1.0"?>
<checkstyle version="5.0">
  <file name="{root}/src/A.java">
    <error line="1" severity="info" message="Class Fan-Out Complexity is 4 (max allowed is 0)." source="{p}ClassFanOutComplexityCheck"/>
    <error line="9" severity="info" message="Class Fan-Out Complexity is 8 (max allowed is 0)." source="{p}ClassFanOutComplexityCheck"/>
    <error line="1" severity="info" message="NCSS for this file is 120 (max allowed is 0)." source="{p}JavaNCSSCheck"/>
    <error line="3" severity="info" message="Cyclomatic Complexity is 3 (max allowed is 0)." source="{p}CyclomaticComplexityCheck"/>
  </file>
  <file name="{root}/src/Empty.java"/>
</checkstyle>"#,
                root = root.display(),
                p = SOURCE_PREFIX
            ),
        )
        .expect("write");

        let output = adapter().parse_report(&report, &ctx).expect("parses");
        let measures = &output.measures["src/A.java"];
        assert!(measures.contains(&Measure::new(MetricKind::FanOut, 6.0)));
        assert!(measures.contains(&Measure::new(MetricKind::Sloc, 120.0)));
        // Cyclomatic complexity comes from JHawk by default.
        assert!(!measures.iter().any(|m| m.kind == MetricKind::CyclomaticComplexity));
        assert!(!output.measures.contains_key("src/Empty.java"));
    }

    #[test]
    fn test_ncss_uses_the_file_count_only() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().join("repo");
        let ctx = context(&root, &dir.path().join("work"));
        let report = dir.path().join("report.xml");
        std::fs::write(
            &report,
            format!(
                r#"<?xml version="1.0"?>
<checkstyle version="5.0">
  <file name="{root}/src/B.java">
    <error line="4" severity="info" message="NCSS for this method is 10 (max allowed is 0)." source="{p}JavaNCSSCheck"/>
    <error line="20" severity="info" message="NCSS for this method is 12 (max allowed is 0)." source="{p}JavaNCSSCheck"/>
    <error line="2" severity="info" message="NCSS for this class is 45 (max allowed is 0)." source="{p}JavaNCSSCheck"/>
    <error line="1" severity="info" message="NCSS for this file is 50 (max allowed is 0)." source="{p}JavaNCSSCheck"/>
  </file>
  <file name="{root}/src/C.java">
    <error line="4" severity="info" message="NCSS for this method is 10 (max allowed is 0)." source="{p}JavaNCSSCheck"/>
  </file>
</checkstyle>"#,
                root = root.display(),
                p = SOURCE_PREFIX
            ),
        )
        .expect("write");

        let output = adapter().parse_report(&report, &ctx).expect("parses");
        let sloc: Vec<&Measure> = output.measures["src/B.java"]
            .iter()
            .filter(|m| m.kind == MetricKind::Sloc)
            .collect();
        assert_eq!(sloc, vec![&Measure::new(MetricKind::Sloc, 50.0)]);
        assert!(!output.measures.contains_key("src/C.java"));
    }

    #[test]
    fn test_default_rules_report_ncss_per_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = context(dir.path(), &dir.path().join("work"));
        let files = vec![SourceFile {
            id: FileId(0),
            path: "A.java".to_string(),
            language: Language::Java,
        }];
        adapter().configure(&files, &ctx).expect("configure");

        let rules = std::fs::read_to_string(ctx.work_dir.join("checkstyle/rules.xml")).expect("rules");
        assert!(rules.contains(r#"<property name="fileMaximum" value="0"/>"#));
        assert!(!rules.contains(r#"<property name="methodMaximum" value="0"/>"#));
        assert!(!rules.contains(r#"<property name="classMaximum" value="0"/>"#));
    }

    /// Reports fan-out and NCSS at method and file level for every fileset.
    const FAKE_CHECKSTYLE: &str = r#"#!/bin/sh
descriptor="$1"
report=$(sed -n 's/.*tofile="\([^"]*\)".*/\1/p' "$descriptor")
p=com.puppycrawl.tools.checkstyle.checks.metrics.
{
  echo '<?xml version="1.0"?><checkstyle version="5.0">'
  sed -n 's/.*<fileset file="\([^"]*\)".*/\1/p' "$descriptor" | while read -r path; do
    echo "<file name=\"$path\">"
    echo "<error severity=\"info\" message=\"Class Fan-Out Complexity is 3 (max allowed is 0).\" source=\"${p}ClassFanOutComplexityCheck\"/>"
    echo "<error severity=\"info\" message=\"NCSS for this method is 5 (max allowed is 0).\" source=\"${p}JavaNCSSCheck\"/>"
    echo "<error severity=\"info\" message=\"NCSS for this file is 40 (max allowed is 0).\" source=\"${p}JavaNCSSCheck\"/>"
    echo "</file>"
  done
  echo '</checkstyle>'
} > "$report"
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_single_run_reports_every_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().join("repo");
        std::fs::create_dir_all(&root).expect("root");
        let script = dir.path().join("checkstyle.sh");
        std::fs::write(&script, FAKE_CHECKSTYLE).expect("script");
        let ctx = context(&root, &dir.path().join("work"));

        let mut config = ToolsConfig::default().checkstyle;
        config.executable = "sh".to_string();
        config.args = vec![script.display().to_string(), "{descriptor}".to_string()];
        let mut adapter = CheckstyleAdapter::new(config).expect("adapter");

        let files: Vec<_> = (0..120)
            .map(|i| SourceFile {
                id: FileId(i),
                path: format!("src/pkg/C{i}.java"),
                language: Language::Java,
            })
            .collect();
        adapter.configure(&files, &ctx).expect("configure");
        adapter.run(&CancellationToken::new()).await.expect("run");
        let output = adapter.parse(&ctx).expect("parse");

        assert_eq!(output.measures.len(), 120);
        let measures = &output.measures["src/pkg/C7.java"];
        assert!(measures.contains(&Measure::new(MetricKind::FanOut, 3.0)));
        assert!(measures.contains(&Measure::new(MetricKind::Sloc, 40.0)));

        // The configuration was consumed by the run.
        adapter.run(&CancellationToken::new()).await.expect("run");
        assert!(adapter.parse(&ctx).expect("parse").is_empty());
    }

    #[test]
    fn test_parse_without_run_is_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = context(dir.path(), &dir.path().join("work"));
        let mut adapter = adapter();
        let files = vec![SourceFile {
            id: FileId(0),
            path: "A.java".to_string(),
            language: Language::Java,
        }];
        adapter.configure(&files, &ctx).expect("configure");

        assert!(adapter.parse(&ctx).expect("parse").is_empty());
        assert!(ctx.work_dir.join("checkstyle/r1.xml").exists());
        assert!(ctx.work_dir.join("checkstyle/rules.xml").exists());
    }

    #[test]
    fn test_configure_without_files_schedules_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = context(dir.path(), &dir.path().join("work"));
        let mut adapter = adapter();
        adapter.configure(&[], &ctx).expect("configure");
        assert!(adapter.job.is_none());
        assert!(!ctx.work_dir.join("checkstyle").exists());
    }
}
