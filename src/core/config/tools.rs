//! Per-adapter settings: executable, argument template, batching and the
//! metric kinds each adapter is authoritative for.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{QualeError, Result};
use crate::core::model::MetricKind;

use super::validation::{validate_non_blank, validate_positive_usize};

/// Placeholders substituted into tool arguments.
pub const ARG_PLACEHOLDERS: [&str; 5] = ["{descriptor}", "{report}", "{input}", "{base}", "{revision}"];

/// Settings of a single analysis tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Run this adapter during measurement
    #[serde(default = "ToolConfig::default_enabled")]
    pub enabled: bool,

    /// Program to spawn
    pub executable: String,

    /// Arguments; may reference the placeholders in [`ARG_PLACEHOLDERS`]
    #[serde(default)]
    pub args: Vec<String>,

    /// Files per subprocess invocation, for adapters that chunk their input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Metric kinds taken from this tool; other kinds it reports are dropped
    #[serde(default)]
    pub provides: Vec<MetricKind>,

    /// Replacement for the built-in job descriptor template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
}

impl ToolConfig {
    const fn default_enabled() -> bool {
        true
    }

    /// Validate a tool entry
    pub fn validate(&self, name: &str) -> Result<()> {
        validate_non_blank(&self.executable, &format!("tools.{name}.executable"))?;
        if let Some(batch_size) = self.batch_size {
            validate_positive_usize(batch_size, &format!("tools.{name}.batch_size"))?;
        }
        if self.enabled && self.provides.is_empty() {
            return Err(QualeError::config_field(
                "an enabled tool must provide at least one metric",
                format!("tools.{name}.provides"),
            ));
        }
        Ok(())
    }
}

/// Settings for every bundled adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Checkstyle metric checks, run once over all Java files
    #[serde(default = "ToolsConfig::default_checkstyle")]
    pub checkstyle: ToolConfig,

    /// JHawk, run over fixed-size chunks of Java files
    #[serde(default = "ToolsConfig::default_jhawk")]
    pub jhawk: ToolConfig,

    /// complexity-report, run once per JavaScript file
    #[serde(default = "ToolsConfig::default_complexity_report")]
    pub complexity_report: ToolConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            checkstyle: Self::default_checkstyle(),
            jhawk: Self::default_jhawk(),
            complexity_report: Self::default_complexity_report(),
        }
    }
}

impl ToolsConfig {
    /// Default JHawk chunk size.
    pub const DEFAULT_BATCH_SIZE: usize = 50;

    fn default_checkstyle() -> ToolConfig {
        ToolConfig {
            enabled: true,
            executable: "ant".to_string(),
            args: vec!["-f".to_string(), "{descriptor}".to_string(), "measure".to_string()],
            batch_size: None,
            provides: vec![MetricKind::FanIn, MetricKind::FanOut, MetricKind::Sloc],
            template: None,
        }
    }

    fn default_jhawk() -> ToolConfig {
        ToolConfig {
            enabled: true,
            executable: "ant".to_string(),
            args: vec![
                "-lib".to_string(),
                "lib/jhawk/JHawkCommandLine.jar".to_string(),
                "-f".to_string(),
                "{descriptor}".to_string(),
            ],
            batch_size: Some(Self::DEFAULT_BATCH_SIZE),
            provides: vec![
                MetricKind::CyclomaticComplexity,
                MetricKind::HalsteadVolume,
                MetricKind::HalsteadDifficulty,
                MetricKind::HalsteadEffort,
            ],
            template: None,
        }
    }

    fn default_complexity_report() -> ToolConfig {
        ToolConfig {
            enabled: true,
            executable: "cr".to_string(),
            args: vec![
                "-f".to_string(),
                "json".to_string(),
                "-o".to_string(),
                "{report}".to_string(),
                "{input}".to_string(),
            ],
            batch_size: None,
            provides: vec![
                MetricKind::CyclomaticComplexity,
                MetricKind::HalsteadVolume,
                MetricKind::HalsteadDifficulty,
                MetricKind::HalsteadEffort,
                MetricKind::Sloc,
            ],
            template: None,
        }
    }

    /// Entry of the adapter called `name`.
    pub fn get(&self, name: &str) -> Option<&ToolConfig> {
        match name {
            "checkstyle" => Some(&self.checkstyle),
            "jhawk" => Some(&self.jhawk),
            "complexity_report" => Some(&self.complexity_report),
            _ => None,
        }
    }

    /// Validate every tool entry
    pub fn validate(&self) -> Result<()> {
        self.checkstyle.validate("checkstyle")?;
        self.jhawk.validate("jhawk")?;
        self.complexity_report.validate("complexity_report")?;
        Ok(())
    }
}
