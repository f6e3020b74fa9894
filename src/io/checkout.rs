//! Making a revision's files readable before the adapters run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::expand_args;
use crate::adapters::process::execute;
use crate::core::errors::{QualeError, Result};

/// Produces the directory holding a revision's files.
#[async_trait]
pub trait Checkout: Send + Sync {
    /// Bring `revision` into place and return its root directory
    async fn prepare(&self, revision: &str) -> Result<PathBuf>;
}

/// A directory that already holds the right files, e.g. one export per pass.
#[derive(Debug, Clone)]
pub struct StaticCheckout {
    root: PathBuf,
}

impl StaticCheckout {
    /// Serve every revision from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Checkout for StaticCheckout {
    async fn prepare(&self, _revision: &str) -> Result<PathBuf> {
        Ok(self.root.clone())
    }
}

/// Runs a command such as `git -C {root} checkout -q {revision}` before
/// every revision.
#[derive(Debug, Clone)]
pub struct CommandCheckout {
    root: PathBuf,
    program: String,
    args: Vec<String>,
}

impl CommandCheckout {
    /// Parse a whitespace separated command template.
    pub fn new(root: impl Into<PathBuf>, template: &str) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            QualeError::config_field("checkout command must not be empty", "checkout_command")
        })?;
        Ok(Self {
            root: root.into(),
            program,
            args: parts.collect(),
        })
    }

    /// The checkout root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn arguments(&self, revision: &str) -> Vec<String> {
        expand_args(
            &self.args,
            &[
                ("{root}", self.root.display().to_string()),
                ("{revision}", revision.to_string()),
            ],
        )
    }
}

#[async_trait]
impl Checkout for CommandCheckout {
    async fn prepare(&self, revision: &str) -> Result<PathBuf> {
        let args = self.arguments(revision);
        execute("checkout", &self.program, &args, Some(&self.root)).await?;
        debug!(revision, root = %self.root.display(), "Revision checked out");
        Ok(self.root.clone())
    }
}
