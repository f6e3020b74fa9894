//! Quality marks and their aggregation.
//!
//! This module provides:
//! - Calibrated mapping of raw tool values onto the 0.0-3.0 mark scale
//! - SQUALE-style log-domain aggregation of many marks into one score
//! - Per-file scoring with storage rounding

pub mod aggregation;
pub mod normalizer;
pub mod record;

pub use aggregation::{aggregate, arithmetic_mean, round2};
pub use normalizer::{mark_with, Normalizer, MAX_MARK, MIN_MARK};
pub use record::FileScorer;
