//! Reconciliation of submitted files against what the tools reported.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::core::model::Measure;

/// Outcome of comparing a revision's submissions with the tool outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Measures of every file that was reported and did not soft-fail
    pub measured: BTreeMap<String, Vec<Measure>>,
    /// Files that were submitted but produced no usable result
    pub faulty: BTreeSet<String>,
}

impl Reconciliation {
    /// Whether `path` ended up faulty.
    pub fn is_faulty(&self, path: &str) -> bool {
        self.faulty.contains(path)
    }
}

/// Flag every submitted file that no adapter reported, or that an adapter
/// rejected with a soft failure. Reports for files that were never
/// submitted are ignored.
pub fn reconcile(
    submitted: &BTreeSet<String>,
    reported: BTreeMap<String, Vec<Measure>>,
    soft_failed: &BTreeSet<String>,
) -> Reconciliation {
    let measured: BTreeMap<String, Vec<Measure>> = reported
        .into_iter()
        .filter(|(path, measures)| {
            submitted.contains(path) && !soft_failed.contains(path) && !measures.is_empty()
        })
        .collect();

    let faulty: BTreeSet<String> = submitted
        .iter()
        .filter(|path| !measured.contains_key(*path))
        .cloned()
        .collect();

    for path in &faulty {
        if soft_failed.contains(path) {
            warn!(file = %path, "Excluded after a tool could not parse it");
        } else {
            warn!(file = %path, "No analysis tool reported this file");
        }
    }

    Reconciliation { measured, faulty }
}
