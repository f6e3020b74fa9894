//! Driving every enabled adapter over one revision.

use std::collections::BTreeSet;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapters::{
    build_adapters, resolve_reported_path, RunContext, SourceFile, ToolAdapter, ToolOutput,
};
use crate::core::config::ToolsConfig;
use crate::core::errors::Result;
use crate::core::faults::{reconcile, Reconciliation};

/// Runs `configure -> run -> parse` for each adapter and merges the results.
///
/// Adapters share no data, so they run concurrently; each one emits only
/// its own metric kinds, which keeps the merge free of conflicts.
pub struct BatchCoordinator {
    adapters: Vec<Box<dyn ToolAdapter>>,
}

impl BatchCoordinator {
    /// Coordinate `adapters`; they run concurrently for each revision.
    pub fn new(adapters: Vec<Box<dyn ToolAdapter>>) -> Self {
        Self { adapters }
    }

    /// Coordinator over every adapter enabled in `config`.
    pub fn from_config(config: &ToolsConfig) -> Result<Self> {
        Ok(Self::new(build_adapters(config)?))
    }

    /// Names of the adapters, in execution order.
    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.name()).collect()
    }

    /// Measure `files` and reconcile the outputs against the submission.
    ///
    /// The first adapter error aborts the revision. Soft failures and
    /// silently skipped files come back as faulty paths.
    pub async fn measure(
        &mut self,
        files: &[SourceFile],
        ctx: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<Reconciliation> {
        let runs = self
            .adapters
            .iter_mut()
            .map(|adapter| run_adapter(adapter.as_mut(), files, ctx, cancel));
        let outputs = try_join_all(runs).await?;

        let merged = outputs
            .into_iter()
            .fold(ToolOutput::default(), ToolOutput::merge);
        let submitted: BTreeSet<String> = files.iter().map(|file| file.path.clone()).collect();
        let outcome = reconcile(&submitted, merged.measures, &merged.soft_failed);

        info!(
            revision = %ctx.revision,
            submitted = submitted.len(),
            measured = outcome.measured.len(),
            faulty = outcome.faulty.len(),
            "Revision analyzed"
        );
        Ok(outcome)
    }
}

async fn run_adapter(
    adapter: &mut dyn ToolAdapter,
    files: &[SourceFile],
    ctx: &RunContext,
    cancel: &CancellationToken,
) -> Result<ToolOutput> {
    let accepted: Vec<SourceFile> = files
        .iter()
        .filter(|file| adapter.accepts(file.language))
        .cloned()
        .collect();
    if accepted.is_empty() {
        return Ok(ToolOutput::default());
    }

    debug!(tool = adapter.name(), files = accepted.len(), "Running adapter");
    adapter.configure(&accepted, ctx)?;
    adapter.run(cancel).await?;
    let output = adapter.parse(ctx)?;
    Ok(normalize_keys(adapter.name(), output, &accepted, ctx))
}

/// Rewrite reported paths to the submitted ones, dropping unknown files.
fn normalize_keys(
    tool: &str,
    output: ToolOutput,
    files: &[SourceFile],
    ctx: &RunContext,
) -> ToolOutput {
    let mut normalized = ToolOutput::default();
    for (reported, measures) in output.measures {
        match resolve_reported_path(&reported, &ctx.checkout_root, files) {
            Some(file) => normalized.extend(file.path.clone(), measures),
            None => debug!(tool, path = %reported, "Ignoring report for a file that was not submitted"),
        }
    }
    for reported in output.soft_failed {
        if let Some(file) = resolve_reported_path(&reported, &ctx.checkout_root, files) {
            normalized.soft_failed.insert(file.path.clone());
        }
    }
    normalized
}
