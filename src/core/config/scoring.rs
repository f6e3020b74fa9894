//! Scoring configuration: the aggregation base and the calibration table.
//!
//! Thresholds are tunables, not constants. Two pipelines with different
//! tables can run side by side because each receives its own copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::errors::{QualeError, Result};
use crate::core::model::MetricKind;

use super::validation::validate_positive_f64;

/// Interpolation used between a metric's `low` and `high` thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Curve {
    /// `3.0 - 3.0 * value / high`
    Linear,
    /// `2^((reference - value) / scale)`
    Exponential {
        /// Value that maps to a mark of 1.0
        reference: f64,
        /// Distance that halves the mark
        scale: f64,
    },
}

/// Calibration of one metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// At or below this value the mark is 3.0
    pub low: f64,
    /// At or above this value the mark is 0.0
    pub high: f64,
    /// Interpolation in between
    pub curve: Curve,
}

impl Threshold {
    /// Linear calibration
    pub const fn linear(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            curve: Curve::Linear,
        }
    }

    /// Exponential-decay calibration
    pub const fn exponential(low: f64, high: f64, reference: f64, scale: f64) -> Self {
        Self {
            low,
            high,
            curve: Curve::Exponential { reference, scale },
        }
    }

    /// Validate the calibration
    pub fn validate(&self, field: &str) -> Result<()> {
        if !(self.low < self.high) {
            return Err(QualeError::config_field(
                format!("low ({}) must be smaller than high ({})", self.low, self.high),
                field,
            ));
        }
        match self.curve {
            Curve::Linear if self.high <= 0.0 => Err(QualeError::config_field(
                "linear calibration needs a positive high threshold",
                field,
            )),
            Curve::Exponential { scale, .. } => validate_positive_f64(scale, field),
            Curve::Linear => Ok(()),
        }
    }
}

/// Scoring and normalization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Base of the log-domain aggregation; larger values punish low marks harder
    #[serde(default = "ScoringConfig::default_lambda")]
    pub lambda: f64,

    /// Calibration per metric kind; kinds without an entry get no mark
    #[serde(default = "ScoringConfig::default_thresholds")]
    pub thresholds: BTreeMap<MetricKind, Threshold>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            lambda: Self::default_lambda(),
            thresholds: Self::default_thresholds(),
        }
    }
}

impl ScoringConfig {
    fn default_lambda() -> f64 {
        9.0
    }

    /// The calibration table every pipeline starts from.
    pub fn default_thresholds() -> BTreeMap<MetricKind, Threshold> {
        BTreeMap::from([
            (MetricKind::HalsteadVolume, Threshold::linear(20.0, 1000.0)),
            (MetricKind::HalsteadDifficulty, Threshold::linear(10.0, 50.0)),
            (
                MetricKind::CyclomaticComplexity,
                Threshold::exponential(2.0, 20.0, 7.0, 3.5),
            ),
            (MetricKind::Sloc, Threshold::exponential(37.0, 162.0, 70.0, 21.0)),
            (MetricKind::FanIn, Threshold::exponential(19.0, 60.0, 30.0, 7.0)),
            (MetricKind::FanOut, Threshold::exponential(6.0, 19.0, 10.0, 2.0)),
        ])
    }

    /// Validate scoring configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.lambda > 1.0) || !self.lambda.is_finite() {
            return Err(QualeError::config_field(
                format!("lambda must be a finite number greater than 1, got {}", self.lambda),
                "scoring.lambda",
            ));
        }
        for (kind, threshold) in &self.thresholds {
            threshold.validate(&format!("scoring.thresholds.{kind}"))?;
        }
        Ok(())
    }
}
