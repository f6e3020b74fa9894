//! Turning a finalized revision history into a branch with file records.
//!
//! The history walker hands over revisions oldest first. Each changed path
//! becomes one [`FileRecord`] unless it is ignored or cannot be measured by
//! any adapter. Package nodes are created lazily, one per path segment.

use chrono::{DateTime, Timelike, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::core::config::{validate_non_blank, IngestConfig};
use crate::core::errors::{QualeError, Result};
use crate::core::model::{
    split_path, Branch, ChangeKind, Churn, FileId, FileRecord, Language, Revision,
};

/// A branch history as produced by the history walker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryInput {
    /// Branch name
    pub branch: String,
    /// Revisions, oldest first
    pub revisions: Vec<RevisionInput>,
}

/// One revision of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionInput {
    /// VCS-specific identifier
    pub identifier: String,
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// Author name
    #[serde(default)]
    pub author: Option<String>,
    /// Changed files
    #[serde(default)]
    pub files: Vec<ChangeInput>,
}

/// One changed path of a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeInput {
    /// Path relative to the repository root
    pub path: String,
    /// How the revision touched the path
    pub change: ChangeKind,
    /// Source path of a copy or move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_from: Option<String>,
    /// Lines added and removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub churn: Option<Churn>,
}

/// Drop seconds and below; records are compared at minute precision.
pub fn truncate_to_minute(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Builds branches from history input.
#[derive(Debug, Clone)]
pub struct Ingestor {
    ignored_folders: GlobSet,
    ignored_files: GlobSet,
}

impl Ingestor {
    /// Compile the ignore patterns.
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Ok(Self {
            ignored_folders: build_globset(&config.ignored_folders)?,
            ignored_files: build_globset(&config.ignored_files)?,
        })
    }

    /// Whether a file is excluded by the ignore patterns.
    ///
    /// Folder patterns are tried against the package and each of its
    /// ancestors, so `vendor` also hides `vendor/lib`.
    pub fn ignores(&self, package: &str, name: &str) -> bool {
        if self.ignored_files.is_match(name) {
            return true;
        }
        let mut prefix = String::new();
        for segment in package.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if self.ignored_folders.is_match(&prefix) {
                return true;
            }
        }
        false
    }

    /// Build a branch from `input`.
    pub fn ingest(&self, input: &HistoryInput) -> Result<Branch> {
        validate_non_blank(&input.branch, "branch")
            .map_err(|_| QualeError::validation_field("branch name must not be empty", "branch"))?;

        let mut seen = HashSet::new();
        for revision in &input.revisions {
            if revision.identifier.trim().is_empty() {
                return Err(QualeError::validation_field(
                    "revision identifier must not be empty",
                    "revisions.identifier",
                ));
            }
            if !seen.insert(revision.identifier.as_str()) {
                return Err(QualeError::validation_field(
                    format!("duplicate revision {}", revision.identifier),
                    "revisions.identifier",
                ));
            }
        }

        let mut branch = Branch::new(input.branch.clone());
        let mut sequence: u64 = 0;
        let mut skipped = 0usize;
        let mut last_timestamp: Option<DateTime<Utc>> = None;

        for revision in &input.revisions {
            let timestamp = truncate_to_minute(revision.timestamp);
            if last_timestamp.map_or(false, |last| timestamp < last) {
                warn!(revision = %revision.identifier, "Revision is older than its predecessor");
            }
            last_timestamp = Some(timestamp);

            let mut files = Vec::new();
            for change in &revision.files {
                let (package, name) = split_path(&change.path);
                if name.is_empty() || self.ignores(&package, &name) {
                    skipped += 1;
                    continue;
                }
                let Some(language) = Language::classify(&name) else {
                    skipped += 1;
                    continue;
                };

                let copy_of = change.copied_from.as_deref().and_then(|source| {
                    let (source_package, source_name) = split_path(source);
                    branch
                        .files
                        .iter()
                        .rev()
                        .find(|record| record.name == source_name && record.package == source_package)
                        .map(|record| record.id)
                });

                let id = FileId(branch.files.len());
                let package_id = branch.packages.get_or_create(&package);
                branch.files.push(FileRecord {
                    id,
                    revision: revision.identifier.clone(),
                    sequence,
                    timestamp,
                    author: revision.author.clone(),
                    package,
                    name,
                    package_id,
                    language,
                    change: change.change,
                    copy_of,
                    churn: change.churn.unwrap_or_default(),
                    metrics: Default::default(),
                    deltas: Default::default(),
                    predecessor: None,
                    faulty: false,
                });
                sequence += 1;
                files.push(id);
            }

            debug!(revision = %revision.identifier, files = files.len(), "Ingested revision");
            branch.revisions.push(Revision {
                identifier: revision.identifier.clone(),
                timestamp,
                author: revision.author.clone(),
                measured: false,
                files,
            });
        }

        branch.packages.reindex();
        info!(
            branch = %branch.name,
            revisions = branch.revisions.len(),
            files = branch.files.len(),
            packages = branch.packages.len(),
            skipped,
            "History ingested"
        );
        Ok(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn change(path: &str, change: ChangeKind) -> ChangeInput {
        ChangeInput {
            path: path.to_string(),
            change,
            copied_from: None,
            churn: None,
        }
    }

    fn revision(id: &str, minute: u32, second: u32, files: Vec<ChangeInput>) -> RevisionInput {
        RevisionInput {
            identifier: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2013, 5, 1, 9, minute, second).unwrap(),
            author: Some("dev".to_string()),
            files,
        }
    }

    fn history() -> HistoryInput {
        HistoryInput {
            branch: "main".to_string(),
            revisions: vec![
                revision(
                    "r1",
                    0,
                    15,
                    vec![
                        change("src/com/acme/Foo.java", ChangeKind::Added),
                        change("web/app.js", ChangeKind::Added),
                        change("README.md", ChangeKind::Added),
                        change("vendor/lib/Dep.java", ChangeKind::Added),
                    ],
                ),
                revision(
                    "r2",
                    0,
                    45,
                    vec![ChangeInput {
                        path: "src/com/acme/core/Foo.java".to_string(),
                        change: ChangeKind::Moved,
                        copied_from: Some("src/com/acme/Foo.java".to_string()),
                        churn: Some(Churn { added: 3, removed: 1 }),
                    }],
                ),
            ],
        }
    }

    fn ingestor() -> Ingestor {
        Ingestor::new(&IngestConfig {
            ignored_folders: vec!["vendor".to_string()],
            ignored_files: vec!["*Test.java".to_string()],
        })
        .expect("globs")
    }

    #[test]
    fn test_ingest_filters_and_classifies() {
        let branch = ingestor().ingest(&history()).expect("ingests");

        assert_eq!(branch.revisions.len(), 2);
        assert_eq!(branch.files.len(), 3);
        let names: Vec<_> = branch.files.iter().map(|f| f.full_path()).collect();
        assert_eq!(
            names,
            vec!["src/com/acme/Foo.java", "web/app.js", "src/com/acme/core/Foo.java"]
        );
        assert_eq!(branch.files[1].language, Language::JavaScript);
        assert_eq!(branch.files[2].sequence, 2);
    }

    #[test]
    fn test_timestamps_are_truncated_to_the_minute() {
        let branch = ingestor().ingest(&history()).expect("ingests");
        assert_eq!(branch.revisions[0].timestamp, branch.revisions[1].timestamp);
        assert_eq!(branch.files[0].timestamp.second(), 0);
    }

    #[test]
    fn test_copies_resolve_to_latest_source() {
        let branch = ingestor().ingest(&history()).expect("ingests");
        let moved = &branch.files[2];
        assert_eq!(moved.copy_of, Some(FileId(0)));
        assert_eq!(moved.churn, Churn { added: 3, removed: 1 });
    }

    #[test]
    fn test_packages_are_created_per_segment() {
        let branch = ingestor().ingest(&history()).expect("ingests");
        let tree = &branch.packages;

        let acme = tree.find("/src/com/acme").expect("acme");
        let core = tree.find("/src/com/acme/core").expect("core");
        assert!(tree.is_descendant(acme, core));
        assert!(tree.is_leaf(core));
        assert!(tree.find("/vendor").is_none());
        assert_eq!(branch.files[2].package_id, core);
    }

    #[test]
    fn test_ignores() {
        let ingestor = ingestor();
        assert!(ingestor.ignores("vendor/lib", "Dep.java"));
        assert!(ingestor.ignores("src", "FooTest.java"));
        assert!(!ingestor.ignores("src/vendored", "Foo.java"));
    }

    #[test]
    fn test_duplicate_revisions_are_rejected() {
        let mut input = history();
        input.revisions[1].identifier = "r1".to_string();
        let err = ingestor().ingest(&input).unwrap_err();
        assert!(matches!(err, QualeError::Validation { .. }));
    }

    #[test]
    fn test_history_deserializes_from_yaml() {
        let yaml = r#"
branch: main
revisions:
  - identifier: a1
    timestamp: 2013-05-01T09:00:00Z
    author: dev
    files:
      - path: src/Foo.java
        change: A
      - path: src/Bar.java
        change: modified
        churn: {added: 2, removed: 0}
"#;
        let input: HistoryInput = serde_yaml::from_str(yaml).expect("parses");
        assert_eq!(input.revisions[0].files[0].change, ChangeKind::Added);
        assert_eq!(
            input.revisions[0].files[1].churn,
            Some(Churn { added: 2, removed: 0 })
        );
    }
}
