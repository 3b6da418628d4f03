//! Report and registry storage
//!
//! Everything lives under one explicitly passed storage root (default
//! `~/.repoatlas`): the named-set registry (`sets.json`), one report per
//! analysis set under `analysis/`, and the regenerable `index.json`.
//! Passing the root in keeps the core testable against any directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AtlasError;
use crate::models::{AnalysisIndex, AnalysisReport, IndexEntry};

const SETS_FILE: &str = "sets.json";
const ANALYSIS_DIR: &str = "analysis";
const INDEX_FILE: &str = "index.json";

/// A registered analysis set: a name bound to a root path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSet {
    pub name: String,
    pub path: PathBuf,
}

/// Storage root for registry, reports, and index.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default storage root: `~/.repoatlas`, falling back to the current
    /// directory when no home is resolvable.
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".repoatlas")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sets_path(&self) -> PathBuf {
        self.root.join(SETS_FILE)
    }

    fn analysis_dir(&self) -> PathBuf {
        self.root.join(ANALYSIS_DIR)
    }

    /// Path of the persisted report for a set.
    pub fn report_path(&self, name: &str) -> PathBuf {
        self.analysis_dir().join(format!("{}.json", name))
    }

    fn read_sets(&self) -> Result<BTreeMap<String, PathBuf>, AtlasError> {
        let path = self.sets_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_sets(&self, sets: &BTreeMap<String, PathBuf>) -> Result<(), AtlasError> {
        std::fs::create_dir_all(&self.root)?;
        let contents = serde_json::to_string_pretty(sets)?;
        std::fs::write(self.sets_path(), contents)?;
        Ok(())
    }

    /// List all registered sets, sorted by name.
    pub fn list_sets(&self) -> Result<Vec<AnalysisSet>, AtlasError> {
        Ok(self
            .read_sets()?
            .into_iter()
            .map(|(name, path)| AnalysisSet { name, path })
            .collect())
    }

    /// Look up one set by name.
    pub fn get_set(&self, name: &str) -> Result<Option<AnalysisSet>, AtlasError> {
        Ok(self.read_sets()?.remove(name).map(|path| AnalysisSet {
            name: name.to_string(),
            path,
        }))
    }

    /// Register a new set.
    ///
    /// # Errors
    ///
    /// Returns [`AtlasError::SetExists`] when the name is taken.
    pub fn add_set(&self, name: &str, path: &Path) -> Result<(), AtlasError> {
        let mut sets = self.read_sets()?;
        if sets.contains_key(name) {
            return Err(AtlasError::SetExists(name.to_string()));
        }
        sets.insert(name.to_string(), path.to_path_buf());
        self.write_sets(&sets)
    }

    /// Remove a set and its persisted report, then rebuild the index.
    /// Returns false when the set was not registered.
    pub fn remove_set(&self, name: &str) -> Result<bool, AtlasError> {
        let mut sets = self.read_sets()?;
        if sets.remove(name).is_none() {
            return Ok(false);
        }
        self.write_sets(&sets)?;

        let report = self.report_path(name);
        if report.exists() {
            std::fs::remove_file(&report)?;
            debug!("Removed {:?}", report);
            self.rebuild_index()?;
        }
        Ok(true)
    }

    /// Persist a report, superseding any previous run for the same name.
    pub fn write_report(&self, report: &AnalysisReport) -> Result<PathBuf, AtlasError> {
        std::fs::create_dir_all(self.analysis_dir())?;
        let path = self.report_path(&report.analysis_set);
        let contents = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Rebuild `index.json` by scanning every persisted report.
    ///
    /// Idempotent; safe to run with no reports at all. Unreadable or
    /// corrupt reports are skipped with a warning rather than failing the
    /// rebuild.
    pub fn rebuild_index(&self) -> Result<(), AtlasError> {
        let dir = self.analysis_dir();
        if !dir.exists() {
            return Ok(());
        }

        let mut analyses: Vec<IndexEntry> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if filename == INDEX_FILE || !filename.ends_with(".json") {
                continue;
            }

            match read_index_entry(&path, filename) {
                Ok(entry) => analyses.push(entry),
                Err(e) => {
                    warn!("Failed to read {}: {}; skipping", filename, e);
                }
            }
        }

        analyses.sort_by(|a, b| a.name.cmp(&b.name));

        let index = AnalysisIndex {
            analyses,
            updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        let contents = serde_json::to_string_pretty(&index)?;
        std::fs::write(dir.join(INDEX_FILE), contents)?;
        Ok(())
    }
}

fn read_index_entry(path: &Path, filename: &str) -> Result<IndexEntry, AtlasError> {
    let contents = std::fs::read_to_string(path)?;
    let report: AnalysisReport = serde_json::from_str(&contents)?;
    Ok(IndexEntry {
        name: report.analysis_set,
        filename: filename.to_string(),
        generated_at: Some(report.generated_at),
        stats: report.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CouplingReport, ReportStats, TreeNode};
    use tempfile::tempdir;

    fn report(name: &str) -> AnalysisReport {
        AnalysisReport {
            analysis_set: name.to_string(),
            root_path: "/tmp/repos".to_string(),
            generated_at: "2026-08-30T12:00:00.000000Z".to_string(),
            stats: ReportStats {
                total_files: 1,
                total_lines: 10,
                total_repos: 1,
                languages: serde_json::Map::new(),
            },
            coupling: CouplingReport::default(),
            tree: TreeNode::AnalysisSet {
                name: name.to_string(),
                children: vec![],
            },
        }
    }

    #[test]
    fn test_registry_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());

        assert!(storage.list_sets().expect("list").is_empty());
        storage.add_set("work", Path::new("/tmp/work")).expect("add");
        storage.add_set("oss", Path::new("/tmp/oss")).expect("add");

        let sets = storage.list_sets().expect("list");
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].name, "oss");

        let set = storage.get_set("work").expect("get").expect("present");
        assert_eq!(set.path, PathBuf::from("/tmp/work"));

        let err = storage.add_set("work", Path::new("/other")).expect_err("dup");
        assert!(matches!(err, AtlasError::SetExists(_)));

        assert!(storage.remove_set("work").expect("remove"));
        assert!(!storage.remove_set("work").expect("remove again"));
        assert!(storage.get_set("work").expect("get").is_none());
    }

    #[test]
    fn test_write_report_and_rebuild_index() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());

        storage.write_report(&report("alpha")).expect("write");
        storage.write_report(&report("beta")).expect("write");
        storage.rebuild_index().expect("rebuild");

        let index: AnalysisIndex = serde_json::from_str(
            &std::fs::read_to_string(storage.analysis_dir().join(INDEX_FILE)).expect("read"),
        )
        .expect("parse");
        assert_eq!(index.analyses.len(), 2);
        assert_eq!(index.analyses[0].name, "alpha");
        assert_eq!(index.analyses[1].filename, "beta.json");
        assert_eq!(index.analyses[0].stats.total_lines, 10);
    }

    #[test]
    fn test_index_rebuild_idempotent_except_timestamp() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        storage.write_report(&report("alpha")).expect("write");

        storage.rebuild_index().expect("rebuild");
        let first: AnalysisIndex = serde_json::from_str(
            &std::fs::read_to_string(storage.analysis_dir().join(INDEX_FILE)).expect("read"),
        )
        .expect("parse");

        storage.rebuild_index().expect("rebuild again");
        let second: AnalysisIndex = serde_json::from_str(
            &std::fs::read_to_string(storage.analysis_dir().join(INDEX_FILE)).expect("read"),
        )
        .expect("parse");

        assert_eq!(
            serde_json::to_value(&first.analyses).expect("value"),
            serde_json::to_value(&second.analyses).expect("value"),
        );
    }

    #[test]
    fn test_index_rebuild_skips_corrupt_reports() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        storage.write_report(&report("good")).expect("write");
        std::fs::write(storage.analysis_dir().join("broken.json"), "{nope")
            .expect("write corrupt");

        storage.rebuild_index().expect("rebuild");
        let index: AnalysisIndex = serde_json::from_str(
            &std::fs::read_to_string(storage.analysis_dir().join(INDEX_FILE)).expect("read"),
        )
        .expect("parse");
        assert_eq!(index.analyses.len(), 1);
        assert_eq!(index.analyses[0].name, "good");
    }

    #[test]
    fn test_rebuild_with_no_reports_is_fine() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        storage.rebuild_index().expect("rebuild");
        storage.rebuild_index().expect("rebuild twice");
    }

    #[test]
    fn test_remove_set_deletes_report() {
        let dir = tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        storage.add_set("alpha", Path::new("/tmp/a")).expect("add");
        storage.write_report(&report("alpha")).expect("write");

        assert!(storage.remove_set("alpha").expect("remove"));
        assert!(!storage.report_path("alpha").exists());
    }
}
