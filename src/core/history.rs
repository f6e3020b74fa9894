//! History delta engine.
//!
//! Each measured record is compared with its predecessor in the identity
//! chain: the newest earlier readable, non-faulty record with the same leaf
//! name whose package and the record's own package end in the same segments
//! (one is a trailing segment match of the other), so moves into deeper or
//! shallower folders keep the chain.
//!
//! Timestamps only have minute precision. When several candidates share the
//! newest timestamp, the second one in (timestamp, sequence) descending order
//! is the predecessor; the newest of such a group is usually another edit
//! of the same batch.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use tracing::trace;

use crate::core::errors::{QualeError, Result};
use crate::core::model::{
    has_path_suffix, Branch, ChangeKind, FileId, FileMetrics, FileRecord, MetricDeltas, MetricKind,
};
use crate::core::scoring::round2;

/// Structural information-flow indicator `sloc * (fan_in * fan_out)^2`.
///
/// Undefined when any component is missing or zero.
pub fn hk_indicator(raw: &BTreeMap<MetricKind, f64>) -> Option<f64> {
    let sloc = *raw.get(&MetricKind::Sloc)?;
    let fan_in = *raw.get(&MetricKind::FanIn)?;
    let fan_out = *raw.get(&MetricKind::FanOut)?;
    if sloc == 0.0 || fan_in == 0.0 || fan_out == 0.0 {
        return None;
    }
    Some(round2(sloc * (fan_in * fan_out).powi(2)))
}

fn same_identity_package(current: &str, candidate: &str) -> bool {
    has_path_suffix(current, candidate) || has_path_suffix(candidate, current)
}

/// Predecessor of `current` among `files`.
pub fn find_predecessor(files: &[FileRecord], current: &FileRecord) -> Option<FileId> {
    if current.change == ChangeKind::Added {
        return None;
    }

    let mut candidates: Vec<&FileRecord> = files
        .iter()
        .filter(|candidate| {
            candidate.sequence < current.sequence
                && candidate.timestamp <= current.timestamp
                && candidate.change.is_readable()
                && !candidate.faulty
                && candidate.name == current.name
                && same_identity_package(&current.package, &candidate.package)
        })
        .collect();
    candidates.sort_by_key(|candidate| (Reverse(candidate.timestamp), Reverse(candidate.sequence)));

    let newest = candidates.first()?.timestamp;
    let group = candidates
        .iter()
        .take_while(|candidate| candidate.timestamp == newest)
        .count();
    let chosen = if group > 1 { candidates[1] } else { candidates[0] };

    trace!(
        file = %current.full_path(),
        predecessor = %chosen.revision,
        same_minute = group,
        "Resolved predecessor"
    );
    Some(chosen.id)
}

fn delta_map(
    current: &BTreeMap<MetricKind, f64>,
    previous: Option<&BTreeMap<MetricKind, f64>>,
) -> BTreeMap<MetricKind, f64> {
    current
        .iter()
        .map(|(kind, value)| {
            let delta = previous
                .and_then(|previous| previous.get(kind))
                .map_or(0.0, |before| round2(value - before));
            (*kind, delta)
        })
        .collect()
}

/// Deltas of `current` against `previous`.
///
/// Without a predecessor every delta is zero. A metric missing on either
/// side has a zero delta; `hk` has a delta only when both sides define it.
pub fn compute_deltas(current: &FileMetrics, previous: Option<&FileMetrics>) -> MetricDeltas {
    let hk = match (current.hk, previous.and_then(|p| p.hk)) {
        (Some(now), Some(before)) => Some(round2(now - before)),
        _ => None,
    };
    let composite = match (current.composite, previous.and_then(|p| p.composite)) {
        (Some(now), Some(before)) => round2(now - before),
        _ => 0.0,
    };

    MetricDeltas {
        raw: delta_map(&current.raw, previous.map(|p| &p.raw)),
        marks: delta_map(&current.marks, previous.map(|p| &p.marks)),
        hk,
        composite,
    }
}

/// Store the outcome of measuring `id`.
///
/// `metrics` is `None` for a faulty file, which keeps empty values and zero
/// deltas but still records its predecessor.
pub fn commit_measurement(
    branch: &mut Branch,
    id: FileId,
    metrics: Option<FileMetrics>,
) -> Result<()> {
    let current = branch
        .file(id)
        .ok_or_else(|| QualeError::internal(format!("unknown file record {}", id.0)))?;
    let predecessor = find_predecessor(&branch.files, current);

    let (metrics, deltas, faulty) = match metrics {
        Some(mut metrics) => {
            metrics.hk = hk_indicator(&metrics.raw);
            let previous = predecessor
                .and_then(|pid| branch.file(pid))
                .map(|record| &record.metrics);
            let deltas = compute_deltas(&metrics, previous);
            (metrics, deltas, false)
        }
        None => (FileMetrics::default(), MetricDeltas::default(), true),
    };

    let record = &mut branch.files[id.0];
    record.metrics = metrics;
    record.deltas = deltas;
    record.predecessor = predecessor;
    record.faulty = faulty;
    Ok(())
}
