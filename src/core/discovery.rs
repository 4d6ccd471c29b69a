// MecmLog - core/discovery.rs
//
// Expanding a folder into the log files it contains.
//
// Architecture note: this module uses `walkdir` for directory traversal as an
// OS abstraction (similar to using std::path::Path). It reads only directory
// listings, never file contents; reading is owned by the SourceReader.
//
// Per-entry I/O errors are non-fatal and collected as warnings.

use crate::util::error::DiscoveryError;
use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration for a folder expansion.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum directory recursion depth (1 = direct children only).
    pub max_depth: usize,

    /// Maximum number of matching files before discovery fails.
    pub max_files: usize,

    /// Filename globs a file must match to be included.
    pub include_patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        use crate::util::constants;
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            max_files: constants::DEFAULT_MAX_FILES,
            include_patterns: constants::DEFAULT_INCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// True when `path` looks like a Configuration Manager client log folder
/// (`...\CCM\Logs`), compared case-insensitively with either separator.
pub fn is_ccm_logs_folder(path: &Path) -> bool {
    let normalised = path.to_string_lossy().replace('\\', "/").to_lowercase();
    normalised
        .trim_end_matches('/')
        .ends_with(crate::util::constants::CCM_LOGS_PATH_FRAGMENT)
        || normalised.contains(&format!("{}/", crate::util::constants::CCM_LOGS_PATH_FRAGMENT))
}

/// Discover log files under `root`.
///
/// Returns matching file paths sorted by path (so the source order, and with
/// it tie-breaking in the merged stream, is reproducible) together with
/// human-readable warnings for entries that could not be inspected.
///
/// Fails only when `root` is unusable, a pattern is invalid, or the file
/// limit is exceeded.
pub fn discover_files(
    root: &Path,
    config: &DiscoveryConfig,
) -> Result<(Vec<PathBuf>, Vec<String>), DiscoveryError> {
    let metadata = std::fs::metadata(root).map_err(|_| DiscoveryError::RootNotFound {
        path: root.to_path_buf(),
    })?;
    if !metadata.is_dir() {
        return Err(DiscoveryError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let patterns = config
        .include_patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| DiscoveryError::InvalidPattern {
                pattern: p.clone(),
                source: e,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut files = Vec::new();
    let mut warnings = Vec::new();

    for item in WalkDir::new(root).min_depth(1).max_depth(config.max_depth) {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                let msg = format!("Cannot access entry under '{}': {e}", root.display());
                tracing::debug!(warning = %msg, "Discovery warning");
                warnings.push(msg);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !patterns.is_empty() && !patterns.iter().any(|p| p.matches(&name)) {
            continue;
        }

        if files.len() >= config.max_files {
            return Err(DiscoveryError::MaxFilesExceeded {
                max: config.max_files,
            });
        }

        tracing::trace!(file = %entry.path().display(), "Log file discovered");
        files.push(entry.into_path());
    }

    files.sort();

    tracing::info!(
        root = %root.display(),
        files = files.len(),
        ccm_logs = is_ccm_logs_folder(root),
        "Discovery complete"
    );

    Ok((files, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_ccm_logs_folder_detection() {
        assert!(is_ccm_logs_folder(Path::new(r"C:\Windows\CCM\Logs")));
        assert!(is_ccm_logs_folder(Path::new("/mnt/c/Windows/ccm/logs/")));
        assert!(is_ccm_logs_folder(Path::new("/mnt/c/Windows/CCM/Logs/archive")));
        assert!(!is_ccm_logs_folder(Path::new("/var/log")));
        assert!(!is_ccm_logs_folder(Path::new("/data/ccm/logsbackup")));
    }

    #[test]
    fn test_discovers_only_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CcmExec.log"), "x").unwrap();
        fs::write(dir.path().join("AppEnforce.log"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("old")).unwrap();
        fs::write(dir.path().join("old").join("CcmExec-20240101.log"), "x").unwrap();

        let (files, warnings) = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        assert!(warnings.is_empty());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["AppEnforce.log", "CcmExec.log"]);
    }

    #[test]
    fn test_recursion_depth_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("old")).unwrap();
        fs::write(dir.path().join("old").join("a.log"), "x").unwrap();

        let config = DiscoveryConfig {
            max_depth: 2,
            ..Default::default()
        };
        let (files, _) = discover_files(dir.path(), &config).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_missing_root() {
        let result = discover_files(
            Path::new("/nonexistent/mecmlog-discovery-test"),
            &DiscoveryConfig::default(),
        );
        assert!(matches!(result, Err(DiscoveryError::RootNotFound { .. })));
    }

    #[test]
    fn test_root_is_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.log");
        fs::write(&file, "x").unwrap();
        let result = discover_files(&file, &DiscoveryConfig::default());
        assert!(matches!(result, Err(DiscoveryError::NotADirectory { .. })));
    }

    #[test]
    fn test_max_files_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.log"), "x").unwrap();
        fs::write(dir.path().join("b.log"), "x").unwrap();
        let config = DiscoveryConfig {
            max_files: 1,
            ..Default::default()
        };
        let result = discover_files(dir.path(), &config);
        assert!(matches!(result, Err(DiscoveryError::MaxFilesExceeded { max: 1 })));
    }
}
