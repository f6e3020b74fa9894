//! Adapter selection from configuration.

use tracing::debug;

use super::{CheckstyleAdapter, ComplexityReportAdapter, JHawkAdapter, ToolAdapter};
use crate::core::config::ToolsConfig;
use crate::core::errors::{QualeError, Result};
use crate::core::model::{Language, MetricKind};

/// Instantiate every enabled adapter.
///
/// Two enabled adapters that accept the same language may not provide the
/// same metric kind, so their outputs can be merged without conflicts.
pub fn build_adapters(config: &ToolsConfig) -> Result<Vec<Box<dyn ToolAdapter>>> {
    let mut adapters: Vec<Box<dyn ToolAdapter>> = Vec::new();

    if config.checkstyle.enabled {
        adapters.push(Box::new(CheckstyleAdapter::new(config.checkstyle.clone())?));
    }
    if config.jhawk.enabled {
        adapters.push(Box::new(JHawkAdapter::new(config.jhawk.clone())?));
    }
    if config.complexity_report.enabled {
        adapters.push(Box::new(ComplexityReportAdapter::new(
            config.complexity_report.clone(),
        )));
    }

    check_disjoint(&adapters)?;
    debug!(
        adapters = ?adapters.iter().map(|a| a.name()).collect::<Vec<_>>(),
        "Enabled analysis tools"
    );
    Ok(adapters)
}

fn check_disjoint(adapters: &[Box<dyn ToolAdapter>]) -> Result<()> {
    for (i, first) in adapters.iter().enumerate() {
        for second in &adapters[i + 1..] {
            let shares_language = Language::ALL
                .into_iter()
                .any(|language| first.accepts(language) && second.accepts(language));
            if !shares_language {
                continue;
            }
            let overlap: Vec<MetricKind> = first
                .provides()
                .iter()
                .copied()
                .filter(|kind| second.provides().contains(kind))
                .collect();
            if let Some(kind) = overlap.first() {
                return Err(QualeError::config_field(
                    format!(
                        "{} and {} both provide {kind} for the same files",
                        first.name(),
                        second.name()
                    ),
                    format!("tools.{}.provides", second.name()),
                ));
            }
        }
    }
    Ok(())
}
