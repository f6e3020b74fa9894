//! Branch, revision and file records consumed and produced by a measurement pass.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::packages::{PackageId, PackageTree};

/// Every raw metric an adapter can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Average cyclomatic complexity of the file's sub-units
    CyclomaticComplexity,
    /// Halstead volume
    HalsteadVolume,
    /// Halstead difficulty
    HalsteadDifficulty,
    /// Halstead effort (raw only, never normalized)
    HalsteadEffort,
    /// Incoming structural dependencies
    FanIn,
    /// Outgoing structural dependencies
    FanOut,
    /// Source lines of code
    Sloc,
}

impl MetricKind {
    /// All kinds in storage order.
    pub const ALL: [MetricKind; 7] = [
        MetricKind::CyclomaticComplexity,
        MetricKind::HalsteadVolume,
        MetricKind::HalsteadDifficulty,
        MetricKind::HalsteadEffort,
        MetricKind::FanIn,
        MetricKind::FanOut,
        MetricKind::Sloc,
    ];

    /// Stable snake_case identifier, as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::CyclomaticComplexity => "cyclomatic_complexity",
            MetricKind::HalsteadVolume => "halstead_volume",
            MetricKind::HalsteadDifficulty => "halstead_difficulty",
            MetricKind::HalsteadEffort => "halstead_effort",
            MetricKind::FanIn => "fan_in",
            MetricKind::FanOut => "fan_out",
            MetricKind::Sloc => "sloc",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::CyclomaticComplexity => "Cyclomatic Complexity",
            MetricKind::HalsteadVolume => "Halstead Volume",
            MetricKind::HalsteadDifficulty => "Halstead Difficulty",
            MetricKind::HalsteadEffort => "Halstead Effort",
            MetricKind::FanIn => "Fan In",
            MetricKind::FanOut => "Fan Out",
            MetricKind::Sloc => "SLOC",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw value reported by a tool adapter, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// Metric the value belongs to
    pub kind: MetricKind,
    /// Raw tool value
    pub value: f64,
}

impl Measure {
    /// Create a new measure
    pub fn new(kind: MetricKind, value: f64) -> Self {
        Self { kind, value }
    }
}

/// How a revision touched a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// File created
    #[serde(alias = "A", alias = "add")]
    Added,
    /// File edited in place
    #[serde(alias = "M", alias = "modify")]
    Modified,
    /// File copied or moved from another location
    #[serde(alias = "C", alias = "move", alias = "copied")]
    Moved,
    /// File removed
    #[serde(alias = "D", alias = "delete")]
    Deleted,
}

impl ChangeKind {
    /// Whether the file's content can be read after this change.
    pub fn is_readable(self) -> bool {
        !matches!(self, ChangeKind::Deleted)
    }
}

/// Languages the bundled adapters know how to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Java sources
    Java,
    /// JavaScript sources
    #[serde(alias = "javascript")]
    JavaScript,
}

impl Language {
    /// Every supported language.
    pub const ALL: [Language; 2] = [Language::Java, Language::JavaScript];

    /// Classify a file name by extension. Unmeasurable files yield `None`.
    pub fn classify(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "java" => Some(Language::Java),
            "js" => Some(Language::JavaScript),
            _ => None,
        }
    }

    /// MIME subtype used for the stored classification.
    pub fn mime(self) -> &'static str {
        match self {
            Language::Java => "x-java",
            Language::JavaScript => "javascript",
        }
    }
}

/// Index of a [`FileRecord`] inside its branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub usize);

/// Lines added and removed by the change that produced a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Churn {
    /// Lines added
    pub added: u32,
    /// Lines removed
    pub removed: u32,
}

/// Raw values, marks and composite indicators for one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetrics {
    /// Raw tool values, rounded to two decimals
    pub raw: BTreeMap<MetricKind, f64>,
    /// Normalized 0.0-3.0 marks for every calibrated raw value
    pub marks: BTreeMap<MetricKind, f64>,
    /// Structural information-flow indicator, `sloc * (fan_in * fan_out)^2`
    pub hk: Option<f64>,
    /// Log-domain aggregate of all marks
    pub composite: Option<f64>,
}

impl FileMetrics {
    /// Whether no value at all was recorded.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Differences against the predecessor record. All zero for a first observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDeltas {
    /// Raw value deltas
    pub raw: BTreeMap<MetricKind, f64>,
    /// Mark deltas
    pub marks: BTreeMap<MetricKind, f64>,
    /// Defined only when both records carry an `hk` value
    pub hk: Option<f64>,
    /// Composite index delta
    pub composite: f64,
}

/// One (revision, path) pair touched by a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Position in the branch's file table
    pub id: FileId,
    /// Revision that touched the file
    pub revision: String,
    /// Ingestion order, strictly increasing along the history
    pub sequence: u64,
    /// Revision timestamp, truncated to the minute
    pub timestamp: DateTime<Utc>,
    /// Author of the revision
    pub author: Option<String>,
    /// Folder path without leading or trailing slash
    pub package: String,
    /// Leaf file name
    pub name: String,
    /// Node of the package tree the file lives in
    pub package_id: PackageId,
    /// Classification of the file
    pub language: Language,
    /// Change kind
    pub change: ChangeKind,
    /// Record this one was copied from
    pub copy_of: Option<FileId>,
    /// Line churn reported by the history walker
    #[serde(default)]
    pub churn: Churn,
    /// Measured values
    #[serde(default)]
    pub metrics: FileMetrics,
    /// Deltas against the predecessor
    #[serde(default)]
    pub deltas: MetricDeltas,
    /// Predecessor chosen when the deltas were computed
    #[serde(default)]
    pub predecessor: Option<FileId>,
    /// Submitted for analysis but not reported by any tool
    #[serde(default)]
    pub faulty: bool,
}

impl FileRecord {
    /// `package/name`, or just `name` for top-level files.
    pub fn full_path(&self) -> String {
        join_path(&self.package, &self.name)
    }

    /// Clear everything a measurement pass writes.
    pub fn reset_measurement(&mut self) {
        self.metrics = FileMetrics::default();
        self.deltas = MetricDeltas::default();
        self.predecessor = None;
        self.faulty = false;
    }
}

/// Split `a/b/C.java` into `("a/b", "C.java")`.
pub fn split_path(path: &str) -> (String, String) {
    let trimmed = path.trim_matches('/');
    match trimmed.rsplit_once('/') {
        Some((package, name)) => (package.to_string(), name.to_string()),
        None => (String::new(), trimmed.to_string()),
    }
}

/// Inverse of [`split_path`].
pub fn join_path(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}/{name}")
    }
}

/// Whether `suffix` names the trailing path segments of `path`.
///
/// Matching is segment-aligned: `a/b/c` ends with `b/c`, `ab/c` does not.
pub fn has_path_suffix(path: &str, suffix: &str) -> bool {
    let path = path.trim_matches('/');
    let suffix = suffix.trim_matches('/');
    if suffix.is_empty() {
        return path.is_empty();
    }
    path == suffix
        || path
            .strip_suffix(suffix)
            .map_or(false, |head| head.ends_with('/'))
}

/// One point in a branch's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// VCS-specific identifier
    pub identifier: String,
    /// Commit time, truncated to the minute
    pub timestamp: DateTime<Utc>,
    /// Author reference
    pub author: Option<String>,
    /// Set once every file of the revision has been scored and persisted
    #[serde(default)]
    pub measured: bool,
    /// Records created for this revision, in ingestion order
    pub files: Vec<FileId>,
}

/// Measurement status of a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchState {
    /// A pass is running, or the last one failed
    pub measuring: bool,
    /// The last pass completed
    pub measured: bool,
    /// Completion time of the last successful pass
    pub measured_at: Option<DateTime<Utc>>,
    /// Display text of the error that aborted the last pass
    pub last_error: Option<String>,
}

/// A branch's ingested history together with its package tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name
    pub name: String,
    /// Measurement status
    #[serde(default)]
    pub state: BranchState,
    /// Revisions from the chain root to the head
    pub revisions: Vec<Revision>,
    /// All file records, indexed by [`FileId`]
    pub files: Vec<FileRecord>,
    /// Folder hierarchy
    pub packages: PackageTree,
}

impl Branch {
    /// Create an empty branch with just the root package.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: BranchState::default(),
            revisions: Vec::new(),
            files: Vec::new(),
            packages: PackageTree::new(),
        }
    }

    /// Look up a record.
    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(id.0)
    }

    /// Index of the newest revision whose `measured` flag is set.
    pub fn last_measured_revision(&self) -> Option<usize> {
        self.revisions.iter().rposition(|revision| revision.measured)
    }

    /// Number of revisions with the `measured` flag.
    pub fn measured_count(&self) -> usize {
        self.revisions.iter().filter(|revision| revision.measured).count()
    }

    /// Some revisions measured, but not all of them.
    pub fn measuring_interrupted(&self) -> bool {
        let measured = self.measured_count();
        measured > 0 && measured != self.revisions.len()
    }

    /// Readable records of a revision, the ones tools are asked to analyze.
    pub fn readable_files(&self, revision: &Revision) -> Vec<FileId> {
        revision
            .files
            .iter()
            .copied()
            .filter(|id| {
                self.file(*id)
                    .map(|record| record.change.is_readable())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Clear every measurement result so a pass can start from scratch.
    pub fn reset_measurements(&mut self) {
        for revision in &mut self.revisions {
            revision.measured = false;
        }
        for record in &mut self.files {
            record.reset_measurement();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_measured_revision() {
        let mut branch = Branch::new("main");
        assert_eq!(branch.last_measured_revision(), None);
        for (identifier, measured) in [("r1", true), ("r2", true), ("r3", false)] {
            branch.revisions.push(Revision {
                identifier: identifier.to_string(),
                timestamp: chrono::Utc::now(),
                author: None,
                measured,
                files: Vec::new(),
            });
        }
        assert_eq!(branch.last_measured_revision(), Some(1));
        assert!(branch.measuring_interrupted());
    }

    #[test]
    fn test_split_path() {
        assert_eq!(
            split_path("src/pkg/X.java"),
            ("src/pkg".to_string(), "X.java".to_string())
        );
        assert_eq!(split_path("X.java"), (String::new(), "X.java".to_string()));
        assert_eq!(
            split_path("/pkg/X.java"),
            ("pkg".to_string(), "X.java".to_string())
        );
        assert_eq!(join_path("", "X.java"), "X.java");
        assert_eq!(join_path("a/b", "X.java"), "a/b/X.java");
    }

    #[test]
    fn test_path_suffix_is_segment_aligned() {
        assert!(has_path_suffix("src/main/java/com/acme", "com/acme"));
        assert!(has_path_suffix("com/acme", "com/acme"));
        assert!(has_path_suffix("/com/acme/", "acme"));
        assert!(!has_path_suffix("src/xcom/acme", "com/acme"));
        assert!(!has_path_suffix("com/acme", "src/com/acme"));
        assert!(!has_path_suffix("com/acme", ""));
        assert!(has_path_suffix("", ""));
    }

    #[test]
    fn test_language_classification() {
        assert_eq!(Language::classify("Main.java"), Some(Language::Java));
        assert_eq!(Language::classify("app.JS"), Some(Language::JavaScript));
        assert_eq!(Language::classify("setup.py"), None);
        assert_eq!(Language::classify("Makefile"), None);
        assert_eq!(Language::Java.mime(), "x-java");
    }

    #[test]
    fn test_change_kind_aliases() {
        let kinds: Vec<ChangeKind> = serde_json::from_str(r#"["A", "modified", "C", "delete"]"#)
            .expect("change kinds");
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Added,
                ChangeKind::Modified,
                ChangeKind::Moved,
                ChangeKind::Deleted
            ]
        );
        assert!(!ChangeKind::Deleted.is_readable());
        assert!(ChangeKind::Moved.is_readable());
    }

    #[test]
    fn test_metric_kind_keys_serialize_snake_case() {
        let mut raw = BTreeMap::new();
        raw.insert(MetricKind::FanIn, 3.0);
        let json = serde_json::to_string(&raw).expect("serialize");
        assert_eq!(json, r#"{"fan_in":3.0}"#);
    }
}
