use super::*;
use crate::adapters::{ToolAdapter, ToolOutput};
use crate::core::config::IngestConfig;
use crate::core::errors::ExecutionFailure;
use crate::core::ingest::{ChangeInput, HistoryInput, Ingestor, RevisionInput};
use crate::core::model::{ChangeKind, FileId, Language, Measure, MetricKind};
use crate::io::{MemoryStore, StaticCheckout};
use approx::assert_relative_eq;
use async_trait::async_trait;
use chrono::TimeZone;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;

/// Reports a per-revision complexity for every file it is given.
struct ScriptedTool {
    values: HashMap<&'static str, f64>,
    fail_on: Option<&'static str>,
    pending: Vec<SourceFile>,
    revision: String,
    ran: bool,
}

impl ScriptedTool {
    fn new(values: &[(&'static str, f64)]) -> Self {
        Self {
            values: values.iter().copied().collect(),
            fail_on: None,
            pending: Vec::new(),
            revision: String::new(),
            ran: false,
        }
    }
}

#[async_trait]
impl ToolAdapter for ScriptedTool {
    fn name(&self) -> &str {
        "scripted"
    }

    fn accepts(&self, language: Language) -> bool {
        language == Language::Java
    }

    fn provides(&self) -> &[MetricKind] {
        &[MetricKind::CyclomaticComplexity]
    }

    fn configure(&mut self, files: &[SourceFile], ctx: &RunContext) -> Result<()> {
        self.pending = files.to_vec();
        self.revision = ctx.revision.clone();
        self.ran = false;
        Ok(())
    }

    async fn run(&mut self, _cancel: &CancellationToken) -> Result<()> {
        if self.fail_on == Some(self.revision.as_str()) {
            return Err(QualeError::execution(ExecutionFailure {
                tool: "scripted".to_string(),
                command: vec!["scripted".to_string(), self.revision.clone()],
                exit_code: Some(2),
                stdout: String::new(),
                stderr: "boom".to_string(),
            }));
        }
        self.ran = true;
        Ok(())
    }

    fn parse(&mut self, _ctx: &RunContext) -> Result<ToolOutput> {
        let mut output = ToolOutput::default();
        if !std::mem::take(&mut self.ran) {
            return Ok(output);
        }
        if let Some(value) = self.values.get(self.revision.as_str()) {
            for file in &self.pending {
                output.extend(file.path.clone(), [Measure::new(MetricKind::CyclomaticComplexity, *value)]);
            }
        }
        Ok(output)
    }
}

fn revision(id: &str, minute: u32, change: ChangeKind) -> RevisionInput {
    RevisionInput {
        identifier: id.to_string(),
        timestamp: Utc.with_ymd_and_hms(2013, 5, 1, 9, minute, 0).unwrap(),
        author: None,
        files: vec![ChangeInput {
            path: "pkg/X.java".to_string(),
            change,
            copied_from: None,
            churn: None,
        }],
    }
}

fn branch() -> Branch {
    let input = HistoryInput {
        branch: "main".to_string(),
        revisions: vec![
            revision("r1", 0, ChangeKind::Added),
            revision("r2", 5, ChangeKind::Modified),
        ],
    };
    Ingestor::new(&IngestConfig::default())
        .unwrap()
        .ingest(&input)
        .unwrap()
}

fn pass(tool: ScriptedTool, work: &TempDir) -> MeasurementPass {
    let mut config = QualeConfig::default();
    config.io.work_dir = work.path().to_path_buf();
    let coordinator = BatchCoordinator::new(vec![Box::new(tool)]);
    MeasurementPass::with_coordinator(
        config,
        coordinator,
        Arc::new(StaticCheckout::new(work.path())),
    )
    .unwrap()
}

#[tokio::test]
async fn test_complexity_regression_across_two_revisions() {
    let work = TempDir::new().unwrap();
    let mut pass = pass(ScriptedTool::new(&[("r1", 5.0), ("r2", 25.0)]), &work);
    let mut branch = branch();
    let mut store = MemoryStore::new();

    let summary = pass.run(&mut branch, &mut store, PassMode::Fresh).await.unwrap();
    assert_eq!(summary.revisions_measured, 2);
    assert_eq!(summary.files_measured, 2);
    assert_eq!(summary.files_faulty, 0);

    let cc = MetricKind::CyclomaticComplexity;
    let first = &branch.files[0];
    assert_relative_eq!(first.metrics.marks[&cc], 1.49);
    assert_relative_eq!(first.metrics.composite.unwrap(), 1.49);
    assert_eq!(first.deltas.marks[&cc], 0.0);
    assert_eq!(first.predecessor, None);

    let second = &branch.files[1];
    assert_eq!(second.metrics.marks[&cc], 0.0);
    assert_eq!(second.predecessor, Some(FileId(0)));
    assert_relative_eq!(second.deltas.marks[&cc], -1.49);
    assert_relative_eq!(second.deltas.raw[&cc], 20.0);
    assert_relative_eq!(second.deltas.composite, -1.49);

    assert!(branch.state.measured);
    assert!(!branch.state.measuring);
    assert!(branch.state.measured_at.is_some());
    assert_eq!(store.commits(), 2);
    let stored = store.snapshot().unwrap();
    assert!(stored.revisions.iter().all(|r| r.measured));
    assert_eq!(stored.files[1].deltas, second.deltas);
}

#[tokio::test]
async fn test_failed_pass_keeps_measuring_flag_and_resumes() {
    let work = TempDir::new().unwrap();
    let mut broken = ScriptedTool::new(&[("r1", 5.0), ("r2", 25.0)]);
    broken.fail_on = Some("r2");
    let mut branch = branch();
    let mut store = MemoryStore::new();

    let err = pass(broken, &work)
        .run(&mut branch, &mut store, PassMode::Fresh)
        .await
        .unwrap_err();
    assert!(err.execution_failure().is_some());
    assert!(branch.state.measuring);
    assert!(!branch.state.measured);
    assert!(branch.state.last_error.as_deref().unwrap().contains("boom"));
    assert!(branch.measuring_interrupted());
    assert_eq!(store.commits(), 1);
    assert!(store.snapshot().unwrap().revisions[0].measured);
    assert!(!store.snapshot().unwrap().revisions[1].measured);

    let summary = pass(ScriptedTool::new(&[("r1", 99.0), ("r2", 25.0)]), &work)
        .run(&mut branch, &mut store, PassMode::Resume)
        .await
        .unwrap();
    assert_eq!(summary.revisions_skipped, 1);
    assert_eq!(summary.revisions_measured, 1);
    assert_eq!(branch.files[0].metrics.raw[&MetricKind::CyclomaticComplexity], 5.0);
    assert_relative_eq!(branch.files[1].deltas.marks[&MetricKind::CyclomaticComplexity], -1.49);
    assert!(branch.state.measured);
    assert_eq!(branch.state.last_error, None);
}

#[tokio::test]
async fn test_fresh_pass_discards_previous_results() {
    let work = TempDir::new().unwrap();
    let mut branch = branch();
    let mut store = MemoryStore::new();
    pass(ScriptedTool::new(&[("r1", 5.0), ("r2", 25.0)]), &work)
        .run(&mut branch, &mut store, PassMode::Fresh)
        .await
        .unwrap();

    let summary = pass(ScriptedTool::new(&[("r1", 2.0), ("r2", 2.0)]), &work)
        .run(&mut branch, &mut store, PassMode::Fresh)
        .await
        .unwrap();
    assert_eq!(summary.revisions_skipped, 0);
    assert_eq!(branch.files[1].metrics.marks[&MetricKind::CyclomaticComplexity], 3.0);
    assert_eq!(branch.files[1].deltas.marks[&MetricKind::CyclomaticComplexity], 0.0);
}

#[tokio::test]
async fn test_unreported_file_is_faulty() {
    let work = TempDir::new().unwrap();
    let input = HistoryInput {
        branch: "main".to_string(),
        revisions: vec![
            revision("r1", 0, ChangeKind::Added),
            revision("r2", 5, ChangeKind::Modified),
            revision("r3", 10, ChangeKind::Modified),
        ],
    };
    let mut branch = Ingestor::new(&IngestConfig::default())
        .unwrap()
        .ingest(&input)
        .unwrap();
    let mut store = MemoryStore::new();

    let summary = pass(ScriptedTool::new(&[("r1", 5.0), ("r3", 25.0)]), &work)
        .run(&mut branch, &mut store, PassMode::Fresh)
        .await
        .unwrap();

    let cc = MetricKind::CyclomaticComplexity;
    assert_eq!(summary.files_faulty, 1);
    assert!(branch.files[1].faulty);
    assert!(branch.files[1].metrics.is_empty());
    assert_eq!(branch.files[1].predecessor, Some(FileId(0)));

    // The faulty record is skipped; r3 compares with the last measured state.
    let third = &branch.files[2];
    assert!(!third.faulty);
    assert_eq!(third.predecessor, Some(FileId(0)));
    assert_relative_eq!(third.deltas.marks[&cc], -1.49);
    assert_relative_eq!(third.deltas.raw[&cc], 20.0);
}

#[tokio::test]
async fn test_cancelled_pass_measures_nothing() {
    let work = TempDir::new().unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let mut pass = pass(ScriptedTool::new(&[("r1", 5.0)]), &work).with_cancellation(token);
    let mut branch = branch();
    let mut store = MemoryStore::new();

    let err = pass.run(&mut branch, &mut store, PassMode::Fresh).await.unwrap_err();
    assert!(matches!(err, QualeError::Cancelled { .. }));
    assert_eq!(branch.measured_count(), 0);
    assert!(branch.state.measuring);
}

#[tokio::test]
async fn test_progress_reports_every_revision() {
    let work = TempDir::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut pass = pass(ScriptedTool::new(&[("r1", 5.0), ("r2", 5.0)]), &work).with_progress(
        Box::new(move |revision, fraction| {
            sink.lock().unwrap().push((revision.to_string(), fraction));
        }),
    );

    let mut branch = branch();
    pass.run(&mut branch, &mut MemoryStore::new(), PassMode::Fresh)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![("r1".to_string(), 0.5), ("r2".to_string(), 1.0)]
    );
}
