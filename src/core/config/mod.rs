//! Configuration types and management for quale-rs.
//!
//! A [`QualeConfig`] is threaded explicitly through the measurement entry
//! point; nothing reads configuration from ambient state.

pub mod scoring;
pub mod tools;
pub mod validation;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{QualeError, Result};

pub use scoring::{Curve, ScoringConfig, Threshold};
pub use tools::{ToolConfig, ToolsConfig, ARG_PLACEHOLDERS};
pub use validation::{validate_non_blank, validate_positive_f64, validate_positive_usize};

/// Main configuration for the measurement engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualeConfig {
    /// Aggregation base and calibration thresholds
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Analysis tool adapters
    #[serde(default)]
    pub tools: ToolsConfig,

    /// History ingestion filters
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Work directories and report retention
    #[serde(default)]
    pub io: IoConfig,
}

impl QualeConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            QualeError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            QualeError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.tools.validate()?;
        self.ingest.validate()?;
        Ok(())
    }
}

/// Filters applied while turning a revision's changed-file list into records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Glob patterns matched against the package path
    #[serde(default)]
    pub ignored_folders: Vec<String>,

    /// Glob patterns matched against the leaf file name
    #[serde(default)]
    pub ignored_files: Vec<String>,
}

impl IngestConfig {
    /// Validate the glob patterns
    pub fn validate(&self) -> Result<()> {
        for pattern in self.ignored_folders.iter().chain(&self.ignored_files) {
            globset::Glob::new(pattern)?;
        }
        Ok(())
    }
}

/// Work directory settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoConfig {
    /// Where job descriptors and tool reports are written
    #[serde(default = "IoConfig::default_work_dir")]
    pub work_dir: PathBuf,

    /// Keep descriptors and reports after a revision was parsed
    #[serde(default)]
    pub keep_reports: bool,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            work_dir: Self::default_work_dir(),
            keep_reports: false,
        }
    }
}

impl IoConfig {
    fn default_work_dir() -> PathBuf {
        PathBuf::from(".quale/work")
    }
}
