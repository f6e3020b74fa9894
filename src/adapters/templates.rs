//! Job descriptor rendering.
//!
//! Descriptors are Handlebars templates compiled into the binary; a tool
//! entry in the configuration may point at a replacement file.

use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;

use crate::core::errors::{QualeError, Result};

/// Ant build file driving Checkstyle.
pub const CHECKSTYLE_JOB: &str = include_str!("templates/checkstyle_job.xml.hbs");

/// Checkstyle rule set reporting every metric value as a violation.
pub const CHECKSTYLE_RULES: &str = include_str!("templates/checkstyle_rules.xml.hbs");

/// Ant build file driving JHawk over one chunk.
pub const JHAWK_JOB: &str = include_str!("templates/jhawk_job.xml.hbs");

/// Values available to a job descriptor template.
#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    /// Adapter name
    pub tool: String,
    /// Revision being measured
    pub revision: String,
    /// Checkout root
    pub base_path: String,
    /// Report the tool must write
    pub target: String,
    /// Auxiliary configuration file, if the tool takes one
    pub rules: Option<String>,
    /// Absolute paths of the files to analyze
    pub files: Vec<String>,
}

/// A compiled descriptor template.
pub struct DescriptorTemplate {
    name: String,
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for DescriptorTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorTemplate")
            .field("name", &self.name)
            .finish()
    }
}

impl DescriptorTemplate {
    /// Compile `builtin`, or the file at `override_path` when given.
    pub fn load(name: &str, builtin: &str, override_path: Option<&Path>) -> Result<Self> {
        let source = match override_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                QualeError::io(
                    format!("Failed to read {name} template {}", path.display()),
                    e,
                )
            })?,
            None => builtin.to_string(),
        };

        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_template_string(name, source)?;

        Ok(Self {
            name: name.to_string(),
            registry,
        })
    }

    /// Render with `data`.
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        Ok(self.registry.render(&self.name, data)?)
    }

    /// Render with `data` and write the result to `path`.
    pub fn render_to<T: Serialize>(&self, data: &T, path: &Path) -> Result<()> {
        let content = self.render(data)?;
        std::fs::write(path, content).map_err(|e| {
            QualeError::io(format!("Failed to write descriptor {}", path.display()), e)
        })
    }
}
