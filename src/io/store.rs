//! Storage collaborators for measurement results.
//!
//! The measurement pass only talks to [`MetricStore`]. A revision counts as
//! measured once [`MetricStore::mark_revision_measured`] returned; stores
//! that persist must make everything written before that call durable at
//! that point, so an interrupted pass can resume from the measured prefix.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::errors::{QualeError, Result, ResultExt};
use crate::core::model::{Branch, BranchState, FileRecord};
use crate::core::packages::PackageTree;

/// Persistence of a branch's measurement results.
pub trait MetricStore: Send {
    /// Forget every stored result of `branch` and start from its ingested state
    fn reset(&mut self, branch: &Branch) -> Result<()>;

    /// Continue on top of `branch` as it was loaded, keeping stored results
    fn attach(&mut self, branch: &Branch) -> Result<()>;

    /// Store one measured (or faulty) record
    fn save_file(&mut self, record: &FileRecord) -> Result<()>;

    /// Commit point: every record of the revision has been saved
    fn mark_revision_measured(&mut self, identifier: &str) -> Result<()>;

    /// Store the package tree with fresh nested-set bounds
    fn save_packages(&mut self, packages: &PackageTree) -> Result<()>;

    /// Store the branch status flags
    fn save_branch_state(&mut self, state: &BranchState) -> Result<()>;
}

fn snapshot_mut<'a>(snapshot: &'a mut Option<Branch>, operation: &str) -> Result<&'a mut Branch> {
    snapshot.as_mut().ok_or_else(|| {
        QualeError::storage(format!("{operation} before the store was reset or attached"))
    })
}

fn apply_file(branch: &mut Branch, record: &FileRecord) -> Result<()> {
    let slot = branch.files.get_mut(record.id.0).ok_or_else(|| {
        QualeError::storage(format!("record {} does not belong to branch {}", record.id.0, branch.name))
    })?;
    *slot = record.clone();
    Ok(())
}

fn apply_measured(branch: &mut Branch, identifier: &str) -> Result<()> {
    let revision = branch
        .revisions
        .iter_mut()
        .find(|revision| revision.identifier == identifier)
        .ok_or_else(|| QualeError::storage(format!("unknown revision {identifier}")))?;
    revision.measured = true;
    Ok(())
}

/// Keeps the results in memory; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Option<Branch>,
    commits: usize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored branch.
    pub fn snapshot(&self) -> Option<&Branch> {
        self.snapshot.as_ref()
    }

    /// Number of revision commits seen.
    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl MetricStore for MemoryStore {
    fn reset(&mut self, branch: &Branch) -> Result<()> {
        let mut fresh = branch.clone();
        fresh.reset_measurements();
        self.snapshot = Some(fresh);
        self.commits = 0;
        Ok(())
    }

    fn attach(&mut self, branch: &Branch) -> Result<()> {
        self.snapshot = Some(branch.clone());
        Ok(())
    }

    fn save_file(&mut self, record: &FileRecord) -> Result<()> {
        apply_file(snapshot_mut(&mut self.snapshot, "save_file")?, record)
    }

    fn mark_revision_measured(&mut self, identifier: &str) -> Result<()> {
        apply_measured(snapshot_mut(&mut self.snapshot, "mark_revision_measured")?, identifier)?;
        self.commits += 1;
        Ok(())
    }

    fn save_packages(&mut self, packages: &PackageTree) -> Result<()> {
        snapshot_mut(&mut self.snapshot, "save_packages")?.packages = packages.clone();
        Ok(())
    }

    fn save_branch_state(&mut self, state: &BranchState) -> Result<()> {
        snapshot_mut(&mut self.snapshot, "save_branch_state")?.state = state.clone();
        Ok(())
    }
}

/// Writes a JSON snapshot of the branch, replaced atomically at every commit.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    snapshot: Option<Branch>,
}

impl JsonStore {
    /// Store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: None,
        }
    }

    /// Snapshot file name for a branch inside `dir`.
    pub fn path_for(dir: &Path, branch: &str) -> PathBuf {
        let safe: String = branch
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        dir.join(format!("{safe}.json"))
    }

    /// Where the snapshot is written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a snapshot written by a previous pass.
    pub fn load(path: &Path) -> Result<Branch> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&content).map_err(|e| {
            QualeError::storage_at(
                format!("Snapshot is not a stored branch: {e}"),
                path.display().to_string(),
            )
        })
    }

    fn flush(&self) -> Result<()> {
        let Some(branch) = &self.snapshot else {
            return Ok(());
        };
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                QualeError::io(format!("Failed to create snapshot directory: {}", dir.display()), e)
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(branch)?;
        fs::write(&temp_path, content).map_err(|e| {
            QualeError::io(format!("Failed to write snapshot: {}", temp_path.display()), e)
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            QualeError::io(format!("Failed to replace snapshot: {}", self.path.display()), e)
        })?;
        debug!(path = %self.path.display(), "Snapshot flushed");
        Ok(())
    }
}

impl MetricStore for JsonStore {
    fn reset(&mut self, branch: &Branch) -> Result<()> {
        let mut fresh = branch.clone();
        fresh.reset_measurements();
        self.snapshot = Some(fresh);
        self.flush()
    }

    fn attach(&mut self, branch: &Branch) -> Result<()> {
        self.snapshot = Some(branch.clone());
        Ok(())
    }

    fn save_file(&mut self, record: &FileRecord) -> Result<()> {
        apply_file(snapshot_mut(&mut self.snapshot, "save_file")?, record)
    }

    fn mark_revision_measured(&mut self, identifier: &str) -> Result<()> {
        apply_measured(snapshot_mut(&mut self.snapshot, "mark_revision_measured")?, identifier)?;
        self.flush()
    }

    fn save_packages(&mut self, packages: &PackageTree) -> Result<()> {
        snapshot_mut(&mut self.snapshot, "save_packages")?.packages = packages.clone();
        self.flush()
    }

    fn save_branch_state(&mut self, state: &BranchState) -> Result<()> {
        snapshot_mut(&mut self.snapshot, "save_branch_state")?.state = state.clone();
        self.flush()
    }
}
