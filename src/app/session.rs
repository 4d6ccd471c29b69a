// MecmLog - app/session.rs
//
// Loaded-log session: owns the immutable entry snapshot and everything
// derived from it (filter rows, facet catalogue, load summary).
//
// Adding sources never mutates the published snapshot; a new one is built
// by merging and swapped in. Anything still holding the old `Arc` (an
// in-flight filter pass) keeps a consistent view.

use crate::core::aggregate::{self, SourceReader};
use crate::core::discovery::{self, DiscoveryConfig};
use crate::core::facets::FacetCatalogue;
use crate::core::filter::{snapshot_rows, FilterRow};
use crate::core::model::{LoadSummary, LogEntry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Expand user-supplied paths into the ordered list of sources to load.
///
/// Folders are replaced by the log files discovery finds in them; anything
/// else is kept as given so that unreadable paths surface as source read
/// failures. Discovery problems become warnings. Duplicates keep their first
/// position.
pub fn resolve_paths(inputs: &[PathBuf], config: &DiscoveryConfig) -> (Vec<PathBuf>, Vec<String>) {
    let mut paths = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for input in inputs {
        if input.is_dir() {
            if discovery::is_ccm_logs_folder(input) {
                tracing::info!(folder = %input.display(), "Opening client log folder");
            }
            match discovery::discover_files(input, config) {
                Ok((files, discovery_warnings)) => {
                    if files.is_empty() {
                        warnings.push(format!("No log files found in '{}'", input.display()));
                    }
                    warnings.extend(discovery_warnings);
                    paths.extend(files.into_iter().filter(|f| seen.insert(f.clone())));
                }
                Err(e) => {
                    tracing::warn!(folder = %input.display(), error = %e, "Folder expansion failed");
                    warnings.push(e.to_string());
                }
            }
        } else if seen.insert(input.clone()) {
            paths.push(input.clone());
        }
    }

    (paths, warnings)
}

/// Everything known about the currently loaded sources.
#[derive(Debug, Clone)]
pub struct Session {
    entries: Arc<[LogEntry]>,
    rows: Arc<[FilterRow]>,
    catalogue: FacetCatalogue,
    summary: LoadSummary,
    loaded_paths: Vec<PathBuf>,
    warnings: Vec<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An empty session.
    pub fn new() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
            rows: Arc::from(Vec::new()),
            catalogue: FacetCatalogue::default(),
            summary: LoadSummary::default(),
            loaded_paths: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Load `paths` into a fresh session.
    pub fn load(paths: &[PathBuf], reader: &dyn SourceReader) -> Self {
        let mut session = Self::new();
        session.add_sources(paths, reader);
        session
    }

    /// Load additional sources and merge them into the snapshot.
    ///
    /// Paths already loaded in this session are skipped with a warning.
    /// Returns the number of entries added.
    pub fn add_sources(&mut self, paths: &[PathBuf], reader: &dyn SourceReader) -> usize {
        let (fresh, repeated): (Vec<PathBuf>, Vec<PathBuf>) = paths
            .iter()
            .cloned()
            .partition(|p| !self.is_loaded(p));
        for path in repeated {
            self.warnings
                .push(format!("'{}' is already loaded; skipped", path.display()));
        }
        if fresh.is_empty() {
            return 0;
        }

        let aggregation = aggregate::aggregate(&fresh, reader);
        let added = aggregation.entries.len();

        self.warnings
            .extend(aggregation.failures.iter().map(ToString::to_string));
        self.loaded_paths
            .extend(aggregation.summary.sources.iter().map(|s| s.path.clone()));

        let merged = if self.entries.is_empty() {
            aggregation.entries
        } else {
            aggregate::merge(&self.entries, aggregation.entries)
        };

        self.summary.sources.extend(aggregation.summary.sources);
        self.summary.failed_sources += aggregation.summary.failed_sources;
        self.summary.duration += aggregation.summary.duration;
        self.publish(merged);

        tracing::info!(
            added,
            total = self.entries.len(),
            sources = self.summary.sources.len(),
            "Session snapshot updated"
        );
        added
    }

    fn publish(&mut self, entries: Vec<LogEntry>) {
        self.rows = snapshot_rows(&entries);
        self.catalogue = FacetCatalogue::from_entries(&entries);
        self.summary.total_entries = entries.len();
        self.summary.unparsed_timestamps = self.rows.iter().filter(|r| r.time.is_none()).count();
        self.entries = Arc::from(entries);
    }

    /// The merged, chronologically ordered entries.
    pub fn entries(&self) -> &Arc<[LogEntry]> {
        &self.entries
    }

    /// Filter rows parallel to `entries()`.
    pub fn rows(&self) -> &Arc<[FilterRow]> {
        &self.rows
    }

    pub fn catalogue(&self) -> &FacetCatalogue {
        &self.catalogue
    }

    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.loaded_paths.iter().any(|p| p == path)
    }

    /// Hand over accumulated warnings for display.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::error::SourceError;
    use std::collections::HashMap;
    use std::io;

    struct MapReader(HashMap<PathBuf, String>);

    impl SourceReader for MapReader {
        fn read_source(&self, path: &Path) -> Result<Vec<u8>, SourceError> {
            self.0
                .get(path)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| SourceError::Read {
                    path: path.to_path_buf(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                })
        }
    }

    fn line(message: &str, time: &str, component: &str, log_type: &str) -> String {
        format!(
            "<![LOG[{message}]LOG]!><time=\"{time}\" date=\"01-15-2024\" component=\"{component}\" \
             context=\"\" type=\"{log_type}\" thread=\"1\" file=\"\">\n"
        )
    }

    fn reader() -> MapReader {
        let mut files = HashMap::new();
        files.insert(
            PathBuf::from("/logs/A.log"),
            line("a1", "10:00:00.000+000", "X", "1") + &line("a2", "10:02:00.000+000", "X", "3"),
        );
        files.insert(
            PathBuf::from("/logs/B.log"),
            line("b1", "10:01:00.000+000", "Y", "2"),
        );
        MapReader(files)
    }

    fn messages(session: &Session) -> Vec<&str> {
        session.entries().iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn test_load_merges_and_catalogues() {
        let mut session = Session::load(&[PathBuf::from("/logs/A.log")], &reader());
        assert_eq!(messages(&session), vec!["a1", "a2"]);

        let added = session.add_sources(&[PathBuf::from("/logs/B.log")], &reader());
        assert_eq!(added, 1);
        assert_eq!(messages(&session), vec!["a1", "b1", "a2"]);
        assert_eq!(session.rows().len(), 3);
        assert_eq!(session.catalogue().sources, vec!["A.log", "B.log"]);
        assert_eq!(session.summary().total_entries, 3);
        assert_eq!(session.summary().sources.len(), 2);
    }

    #[test]
    fn test_snapshot_is_replaced_not_mutated() {
        let mut session = Session::load(&[PathBuf::from("/logs/A.log")], &reader());
        let before = Arc::clone(session.entries());
        session.add_sources(&[PathBuf::from("/logs/B.log")], &reader());
        assert_eq!(before.len(), 2);
        assert_eq!(session.entries().len(), 3);
    }

    #[test]
    fn test_failures_and_repeats_become_warnings() {
        let mut session = Session::load(
            &[PathBuf::from("/logs/A.log"), PathBuf::from("/logs/missing.log")],
            &reader(),
        );
        assert_eq!(session.summary().failed_sources, 1);
        assert_eq!(session.add_sources(&[PathBuf::from("/logs/A.log")], &reader()), 0);

        let warnings = session.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("missing.log"));
        assert!(warnings[1].contains("already loaded"));
        assert!(session.take_warnings().is_empty());
    }

    #[test]
    fn test_resolve_paths_expands_folders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.log"), "").unwrap();
        std::fs::write(dir.path().join("a.log"), "").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "").unwrap();
        let extra = PathBuf::from("/not/there.log");

        let (paths, warnings) = resolve_paths(
            &[dir.path().to_path_buf(), extra.clone(), dir.path().join("a.log")],
            &DiscoveryConfig::default(),
        );
        assert!(warnings.is_empty());
        assert_eq!(
            paths,
            vec![dir.path().join("a.log"), dir.path().join("b.log"), extra]
        );
    }

    #[test]
    fn test_resolve_paths_warns_on_empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        let (paths, warnings) =
            resolve_paths(&[dir.path().to_path_buf()], &DiscoveryConfig::default());
        assert!(paths.is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
