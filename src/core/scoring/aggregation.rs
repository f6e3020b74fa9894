//! Log-domain aggregation of marks.
//!
//! `aggregate(m, λ) = -log_λ(mean(λ^-m_i))`. A single poor mark drags the
//! result further down than an arithmetic mean would, and the larger λ is
//! the harder it pulls.

use crate::core::errors::{QualeError, Result};

/// Combine marks into a single score in the same range as the inputs.
pub fn aggregate(marks: &[f64], lambda: f64) -> Result<f64> {
    if marks.is_empty() {
        return Err(QualeError::math("cannot aggregate an empty set of marks"));
    }
    if !(lambda > 1.0) || !lambda.is_finite() {
        return Err(QualeError::math(format!(
            "aggregation base must be finite and greater than 1, got {lambda}"
        )));
    }

    let ln_lambda = lambda.ln();
    let mean = marks
        .iter()
        .map(|mark| (-mark * ln_lambda).exp())
        .sum::<f64>()
        / marks.len() as f64;

    let score = -mean.ln() / ln_lambda;
    if !score.is_finite() {
        return Err(QualeError::math(format!(
            "aggregation of {} marks produced {score}",
            marks.len()
        )));
    }
    Ok(score)
}

/// Plain average, `None` for an empty slice.
pub fn arithmetic_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Round to two decimals, the precision every stored value is kept at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_empty_is_an_error() {
        let err = aggregate(&[], 9.0).unwrap_err();
        assert!(matches!(err, QualeError::Math { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_bad_base_is_an_error() {
        assert!(aggregate(&[1.0], 1.0).is_err());
        assert!(aggregate(&[1.0], f64::INFINITY).is_err());
    }

    #[test]
    fn test_known_values() {
        // λ^-3 and λ^-1 with λ = 9: mean = (1/729 + 1/9) / 2
        let expected = -((1.0 / 729.0 + 1.0 / 9.0) / 2.0f64).ln() / 9f64.ln();
        assert_relative_eq!(aggregate(&[3.0, 1.0], 9.0).unwrap(), expected);
        assert_relative_eq!(round2(expected), 1.31);

        let expected = -((1.0 / 729.0 + 1.0) / 2.0f64).ln() / 9f64.ln();
        assert_relative_eq!(aggregate(&[3.0, 0.0], 9.0).unwrap(), expected);
    }

    #[test]
    fn test_low_mark_dominates() {
        let score = aggregate(&[3.0, 3.0, 3.0, 0.0], 9.0).unwrap();
        assert!(score < arithmetic_mean(&[3.0, 3.0, 3.0, 0.0]).unwrap());
        assert!(score < 1.0);
    }

    #[test]
    fn test_larger_base_pulls_harder() {
        let marks = [3.0, 0.5];
        let gentle = aggregate(&marks, 2.0).unwrap();
        let harsh = aggregate(&marks, 30.0).unwrap();
        assert!(harsh < gentle);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.4859), 1.49);
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(0.004), 0.0);
        assert_eq!(round2(-1.236), -1.24);
    }

    #[test]
    fn test_arithmetic_mean() {
        assert_eq!(arithmetic_mean(&[]), None);
        assert_eq!(arithmetic_mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }

    proptest! {
        #[test]
        fn prop_single_mark_is_identity(mark in 0.0f64..=3.0, lambda in 1.5f64..50.0) {
            let score = aggregate(&[mark], lambda).unwrap();
            prop_assert!((score - mark).abs() < 1e-9);
        }

        #[test]
        fn prop_bounded_by_min_and_mean(
            marks in proptest::collection::vec(0.0f64..=3.0, 1..20),
            lambda in 1.5f64..50.0,
        ) {
            let score = aggregate(&marks, lambda).unwrap();
            let min = marks.iter().cloned().fold(f64::INFINITY, f64::min);
            let mean = arithmetic_mean(&marks).unwrap();
            prop_assert!(score >= min - 1e-9);
            prop_assert!(score <= mean + 1e-9);
        }
    }
}
