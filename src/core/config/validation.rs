//! Validation helper functions for configuration types.

use crate::core::errors::{QualeError, Result};

/// Validate that a usize value is greater than zero.
pub fn validate_positive_usize(value: usize, field: &str) -> Result<()> {
    if value == 0 {
        return Err(QualeError::config_field(
            format!("{field} must be greater than 0"),
            field,
        ));
    }
    Ok(())
}

/// Validate that an f64 value is greater than zero.
pub fn validate_positive_f64(value: f64, field: &str) -> Result<()> {
    if !(value > 0.0) {
        return Err(QualeError::config_field(
            format!("{field} must be greater than 0.0"),
            field,
        ));
    }
    Ok(())
}

/// Validate that a string setting is not blank.
pub fn validate_non_blank(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(QualeError::config_field(
            format!("{field} must not be empty"),
            field,
        ));
    }
    Ok(())
}
