//! The sequential measurement pass over a branch.
//!
//! Revision N+1 reads the stored results of revision N, so revisions are
//! processed strictly in order. A revision is committed only after every
//! one of its records was scored, compared with its predecessor and saved.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{RunContext, SourceFile};
use crate::core::config::QualeConfig;
use crate::core::errors::{QualeError, Result};
use crate::core::history::commit_measurement;
use crate::core::model::Branch;
use crate::core::scoring::FileScorer;
use crate::io::{Checkout, MetricStore};

use super::coordinator::BatchCoordinator;

/// Progress callback: revision identifier and completed fraction
pub type ProgressCallback = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Where a pass starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Discard stored results and measure every revision
    Fresh,
    /// Keep the measured prefix and continue after it
    Resume,
}

/// Counters of a finished pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Revisions measured by this pass
    pub revisions_measured: usize,
    /// Revisions already measured before the pass started
    pub revisions_skipped: usize,
    /// Records that received metrics
    pub files_measured: usize,
    /// Records marked faulty
    pub files_faulty: usize,
}

/// Measures a branch's unmeasured revisions with a fixed configuration.
pub struct MeasurementPass {
    config: QualeConfig,
    scorer: FileScorer,
    coordinator: BatchCoordinator,
    checkout: Arc<dyn Checkout>,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl MeasurementPass {
    /// Build a pass with the adapters enabled in `config`.
    pub fn new(config: QualeConfig, checkout: Arc<dyn Checkout>) -> Result<Self> {
        let coordinator = BatchCoordinator::from_config(&config.tools)?;
        Self::with_coordinator(config, coordinator, checkout)
    }

    /// Build a pass around an existing coordinator.
    pub fn with_coordinator(
        config: QualeConfig,
        coordinator: BatchCoordinator,
        checkout: Arc<dyn Checkout>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scorer: FileScorer::new(&config.scoring),
            config,
            coordinator,
            checkout,
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// Stop starting new revisions and tool batches once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report each committed revision to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Token observed by this pass.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Measure `branch`, persisting through `store`.
    ///
    /// On failure the branch stays flagged as measuring and records the
    /// error text, so the pass can be resumed later.
    pub async fn run(
        &mut self,
        branch: &mut Branch,
        store: &mut dyn MetricStore,
        mode: PassMode,
    ) -> Result<PassSummary> {
        match mode {
            PassMode::Fresh => {
                branch.reset_measurements();
                store.reset(branch)?;
            }
            PassMode::Resume => {
                for revision in branch.revisions.iter().filter(|revision| !revision.measured) {
                    for id in &revision.files {
                        if let Some(record) = branch.files.get_mut(id.0) {
                            record.reset_measurement();
                        }
                    }
                }
                store.attach(branch)?;
            }
        }

        info!(
            branch = %branch.name,
            mode = ?mode,
            revisions = branch.revisions.len(),
            measured = branch.measured_count(),
            adapters = ?self.coordinator.adapter_names(),
            "Measurement pass started"
        );

        branch.state.measuring = true;
        branch.state.measured = false;
        branch.state.last_error = None;
        store.save_branch_state(&branch.state)?;

        match self.measure_revisions(branch, store).await {
            Ok(summary) => {
                branch.packages.reindex();
                store.save_packages(&branch.packages)?;

                branch.state.measuring = false;
                branch.state.measured = true;
                branch.state.measured_at = Some(Utc::now());
                store.save_branch_state(&branch.state)?;

                info!(
                    branch = %branch.name,
                    revisions = summary.revisions_measured,
                    files = summary.files_measured,
                    faulty = summary.files_faulty,
                    "Measurement pass finished"
                );
                Ok(summary)
            }
            Err(error) => {
                warn!(branch = %branch.name, error = %error, "Measurement pass aborted");
                branch.state.last_error = Some(error.to_string());
                if let Err(store_error) = store.save_branch_state(&branch.state) {
                    warn!(error = %store_error, "Failed to record the aborted pass");
                }
                Err(error)
            }
        }
    }

    async fn measure_revisions(
        &mut self,
        branch: &mut Branch,
        store: &mut dyn MetricStore,
    ) -> Result<PassSummary> {
        let total = branch.revisions.len();
        let mut summary = PassSummary::default();

        for index in 0..total {
            if branch.revisions[index].measured {
                summary.revisions_skipped += 1;
                continue;
            }
            let identifier = branch.revisions[index].identifier.clone();
            if self.cancel.is_cancelled() {
                return Err(QualeError::cancelled(format!("revision {identifier}")));
            }

            let files: Vec<SourceFile> = branch
                .readable_files(&branch.revisions[index])
                .into_iter()
                .filter_map(|id| branch.file(id))
                .map(|record| SourceFile {
                    id: record.id,
                    path: record.full_path(),
                    language: record.language,
                })
                .collect();

            if files.is_empty() {
                debug!(revision = %identifier, "No readable files");
            } else {
                self.measure_files(branch, store, &identifier, &files, &mut summary)
                    .await?;
            }

            branch.revisions[index].measured = true;
            store.mark_revision_measured(&identifier)?;
            summary.revisions_measured += 1;

            if let Some(progress) = &self.progress {
                progress(&identifier, (index + 1) as f64 / total as f64);
            }
        }

        Ok(summary)
    }

    async fn measure_files(
        &mut self,
        branch: &mut Branch,
        store: &mut dyn MetricStore,
        revision: &str,
        files: &[SourceFile],
        summary: &mut PassSummary,
    ) -> Result<()> {
        let checkout_root = self.checkout.prepare(revision).await?;
        let mut ctx = RunContext {
            revision: revision.to_string(),
            checkout_root,
            work_dir: self.config.io.work_dir.clone(),
        };
        ctx.work_dir = ctx.work_dir.join(ctx.revision_stem());

        let outcome = self.coordinator.measure(files, &ctx, &self.cancel).await?;

        for file in files {
            let metrics = match outcome.measured.get(&file.path) {
                Some(measures) => Some(self.scorer.score(measures)?),
                None => None,
            };
            if metrics.is_some() {
                summary.files_measured += 1;
            } else {
                summary.files_faulty += 1;
            }
            commit_measurement(branch, file.id, metrics)?;
            store.save_file(&branch.files[file.id.0])?;
        }

        if !self.config.io.keep_reports && ctx.work_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&ctx.work_dir) {
                debug!(dir = %ctx.work_dir.display(), error = %e, "Failed to remove reports");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "measure_tests.rs"]
mod tests;
