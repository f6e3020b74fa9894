//! Loading history input files.

use std::path::Path;

use crate::core::errors::{QualeError, Result};
use crate::core::ingest::HistoryInput;

/// Read a history from JSON (`.json`) or YAML (anything else).
pub fn load_history(path: &Path) -> Result<HistoryInput> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        QualeError::io(format!("Failed to read history file: {}", path.display()), e)
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    let history = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(history)
}
