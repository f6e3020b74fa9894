//! Turning a file's raw measures into stored values, marks and a composite.

use std::collections::BTreeMap;

use crate::core::config::ScoringConfig;
use crate::core::errors::Result;
use crate::core::model::{FileMetrics, Measure, MetricKind};

use super::aggregation::{aggregate, arithmetic_mean, round2};
use super::normalizer::Normalizer;

/// Scores one file at a time with a fixed configuration.
#[derive(Debug, Clone)]
pub struct FileScorer {
    normalizer: Normalizer,
    lambda: f64,
}

impl FileScorer {
    /// Build a scorer from the scoring section of the configuration.
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            normalizer: Normalizer::new(config),
            lambda: config.lambda,
        }
    }

    /// Access the underlying normalizer.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Raw values, marks and composite for a file's measures.
    ///
    /// Several measures of one kind are averaged. Every stored decimal is
    /// rounded to two places; the composite is computed from the rounded
    /// marks and is absent when no mark exists.
    pub fn score(&self, measures: &[Measure]) -> Result<FileMetrics> {
        let mut grouped: BTreeMap<MetricKind, Vec<f64>> = BTreeMap::new();
        for measure in measures.iter().filter(|m| m.value.is_finite()) {
            grouped.entry(measure.kind).or_default().push(measure.value);
        }

        let raw: BTreeMap<MetricKind, f64> = grouped
            .into_iter()
            .filter_map(|(kind, values)| arithmetic_mean(&values).map(|v| (kind, round2(v))))
            .collect();

        let marks: BTreeMap<MetricKind, f64> = self
            .normalizer
            .marks(&raw)
            .into_iter()
            .map(|(kind, mark)| (kind, round2(mark)))
            .collect();

        let composite = if marks.is_empty() {
            None
        } else {
            let values: Vec<f64> = marks.values().copied().collect();
            Some(round2(aggregate(&values, self.lambda)?))
        };

        Ok(FileMetrics {
            raw,
            marks,
            hk: None,
            composite,
        })
    }
}
