//! Calibrated mapping from raw metric values to marks.

use std::collections::BTreeMap;

use crate::core::config::{Curve, ScoringConfig, Threshold};
use crate::core::model::MetricKind;

/// Best possible mark.
pub const MAX_MARK: f64 = 3.0;

/// Worst possible mark.
pub const MIN_MARK: f64 = 0.0;

/// Applies a calibration table to raw values.
#[derive(Debug, Clone)]
pub struct Normalizer {
    thresholds: BTreeMap<MetricKind, Threshold>,
}

impl Normalizer {
    /// Build a normalizer from the scoring section of the configuration.
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            thresholds: config.thresholds.clone(),
        }
    }

    /// Whether `kind` has a calibration.
    pub fn is_calibrated(&self, kind: MetricKind) -> bool {
        self.thresholds.contains_key(&kind)
    }

    /// Mark for `value`, or `None` when `kind` has no calibration.
    pub fn mark(&self, kind: MetricKind, value: f64) -> Option<f64> {
        self.thresholds
            .get(&kind)
            .map(|threshold| mark_with(threshold, value))
    }

    /// Marks for every calibrated entry of `raw`.
    pub fn marks(&self, raw: &BTreeMap<MetricKind, f64>) -> BTreeMap<MetricKind, f64> {
        raw.iter()
            .filter_map(|(kind, value)| self.mark(*kind, *value).map(|mark| (*kind, mark)))
            .collect()
    }
}

/// Mark for `value` under one calibration.
///
/// Values at or below `low` score [`MAX_MARK`], values at or above `high`
/// score [`MIN_MARK`]; the curve decides everything in between and is
/// clamped to the mark range.
pub fn mark_with(threshold: &Threshold, value: f64) -> f64 {
    if value.is_nan() {
        return MIN_MARK;
    }
    if value <= threshold.low {
        return MAX_MARK;
    }
    if value >= threshold.high {
        return MIN_MARK;
    }

    let mark = match threshold.curve {
        Curve::Linear => MAX_MARK - MAX_MARK * value / threshold.high,
        Curve::Exponential { reference, scale } => 2f64.powf((reference - value) / scale),
    };

    mark.clamp(MIN_MARK, MAX_MARK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(&ScoringConfig::default())
    }

    #[test]
    fn test_bounds_for_every_calibrated_kind() {
        let normalizer = normalizer();
        for (kind, threshold) in ScoringConfig::default_thresholds() {
            assert_eq!(normalizer.mark(kind, threshold.low), Some(MAX_MARK), "{kind}");
            assert_eq!(normalizer.mark(kind, threshold.high), Some(MIN_MARK), "{kind}");
            assert_eq!(normalizer.mark(kind, threshold.low - 1.0), Some(MAX_MARK));
            assert_eq!(normalizer.mark(kind, threshold.high * 10.0), Some(MIN_MARK));
        }
    }

    #[test]
    fn test_effort_has_no_mark() {
        assert_eq!(normalizer().mark(MetricKind::HalsteadEffort, 100.0), None);
        assert!(!normalizer().is_calibrated(MetricKind::HalsteadEffort));
    }

    #[test]
    fn test_linear_curve() {
        let mark = normalizer().mark(MetricKind::HalsteadVolume, 500.0).unwrap();
        assert_relative_eq!(mark, 1.5);

        let mark = normalizer().mark(MetricKind::HalsteadDifficulty, 25.0).unwrap();
        assert_relative_eq!(mark, 1.5);
    }

    #[test]
    fn test_exponential_curve() {
        let normalizer = normalizer();

        let cc = normalizer.mark(MetricKind::CyclomaticComplexity, 5.0).unwrap();
        assert_relative_eq!(cc, 2f64.powf(2.0 / 3.5));

        let sloc = normalizer.mark(MetricKind::Sloc, 70.0).unwrap();
        assert_relative_eq!(sloc, 1.0);

        let fan_in = normalizer.mark(MetricKind::FanIn, 37.0).unwrap();
        assert_relative_eq!(fan_in, 0.5);
    }

    #[test]
    fn test_exponential_curve_is_clamped_to_max() {
        // 2^((10 - 6.5) / 2) is above 3.0 just past the low threshold.
        let fan_out = normalizer().mark(MetricKind::FanOut, 6.5).unwrap();
        assert_eq!(fan_out, MAX_MARK);
    }

    #[test]
    fn test_marks_skips_uncalibrated_kinds() {
        let raw = BTreeMap::from([
            (MetricKind::CyclomaticComplexity, 25.0),
            (MetricKind::HalsteadEffort, 12_000.0),
        ]);
        let marks = normalizer().marks(&raw);
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[&MetricKind::CyclomaticComplexity], 0.0);
    }

    #[test]
    fn test_nan_scores_worst() {
        assert_eq!(normalizer().mark(MetricKind::Sloc, f64::NAN), Some(MIN_MARK));
    }

    proptest! {
        #[test]
        fn prop_marks_stay_in_range(value in -100.0f64..5000.0) {
            let normalizer = normalizer();
            for kind in MetricKind::ALL {
                if let Some(mark) = normalizer.mark(kind, value) {
                    prop_assert!((MIN_MARK..=MAX_MARK).contains(&mark));
                }
            }
        }

        #[test]
        fn prop_mark_is_non_increasing(a in 0.0f64..2000.0, b in 0.0f64..2000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let normalizer = normalizer();
            for kind in MetricKind::ALL {
                if let (Some(m_lo), Some(m_hi)) = (normalizer.mark(kind, lo), normalizer.mark(kind, hi)) {
                    prop_assert!(m_hi <= m_lo, "{} {} -> {}, {} -> {}", kind, lo, m_lo, hi, m_hi);
                }
            }
        }
    }
}
