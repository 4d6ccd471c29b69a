// MecmLog - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no UI,
// no platform dependencies.
//
// These types are the shared vocabulary across all layers.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Log Entry (output of the line parser)
// =============================================================================

/// A single parsed log record.
///
/// Every field is always present: values the line did not supply are empty
/// strings and an unrecognised type code maps to `LogType::Unknown`.
/// `message` is untrusted text and must be escaped by whatever renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Free-form message body.
    pub message: String,

    /// `"<date> <time>"` exactly as written in the source line.
    pub timestamp: String,

    /// Component attribute (the emitting client component).
    pub component: String,

    /// Entry severity.
    #[serde(rename = "type")]
    pub log_type: LogType,

    /// Thread attribute.
    pub thread: String,

    /// Origin identifier: the file name the entry was read from.
    /// Empty until the aggregator tags it.
    pub source: String,

    /// 1-based line number within the source.
    pub line_number: u64,
}

// =============================================================================
// Log type
// =============================================================================

/// Entry severity as encoded by the `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
pub enum LogType {
    Info,
    Warning,
    Error,
    #[default]
    Unknown,
}

impl LogType {
    /// Map the raw numeric `type` attribute to a variant.
    ///
    /// Total: anything other than `"1"`, `"2"` or `"3"` is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "1" => LogType::Info,
            "2" => LogType::Warning,
            "3" => LogType::Error,
            _ => LogType::Unknown,
        }
    }

    /// Parse a display label (case-insensitive), as typed on the command line.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Returns all variants in display order.
    pub fn all() -> &'static [LogType] {
        &[
            LogType::Info,
            LogType::Warning,
            LogType::Error,
            LogType::Unknown,
        ]
    }

    /// Human-readable label for display. Also the value the type facet and
    /// text search operate on.
    pub fn label(&self) -> &'static str {
        match self {
            LogType::Info => "Info",
            LogType::Warning => "Warning",
            LogType::Error => "Error",
            LogType::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Facets
// =============================================================================

/// A categorical filter dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetCategory {
    Source,
    Component,
    Type,
}

impl FacetCategory {
    pub fn all() -> &'static [FacetCategory] {
        &[
            FacetCategory::Source,
            FacetCategory::Component,
            FacetCategory::Type,
        ]
    }

    /// Plural heading used by the presentation layer ("Sources", ...).
    pub fn title(&self) -> &'static str {
        match self {
            FacetCategory::Source => "Sources",
            FacetCategory::Component => "Components",
            FacetCategory::Type => "Types",
        }
    }

    /// Parse a category name as typed by the user (singular or plural).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "source" | "sources" => Some(FacetCategory::Source),
            "component" | "components" => Some(FacetCategory::Component),
            "type" | "types" => Some(FacetCategory::Type),
            _ => None,
        }
    }

    /// The value of this facet for `entry`.
    pub fn value_of<'a>(&self, entry: &'a LogEntry) -> &'a str {
        match self {
            FacetCategory::Source => &entry.source,
            FacetCategory::Component => &entry.component,
            FacetCategory::Type => entry.log_type.label(),
        }
    }
}

// =============================================================================
// Filter results
// =============================================================================

/// Visibility decision for one row, addressed by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityResult {
    pub visible: bool,

    /// Text (literal or pattern) the presentation layer should mark.
    /// Present only when `visible` and a non-empty search was applied.
    pub highlight_term: Option<Arc<str>>,
}

impl VisibilityResult {
    pub fn shown() -> Self {
        Self {
            visible: true,
            highlight_term: None,
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            highlight_term: None,
        }
    }
}

/// Row-count summary shown next to the filter controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowSummary {
    pub visible: usize,
    pub total: usize,
}

impl RowSummary {
    /// Count visible rows in a result set.
    pub fn from_results(results: &[VisibilityResult]) -> Self {
        Self {
            visible: results.iter().filter(|r| r.visible).count(),
            total: results.len(),
        }
    }

    /// Summary for an unfiltered view of `total` rows.
    pub fn all(total: usize) -> Self {
        Self {
            visible: total,
            total,
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.visible == self.total
    }
}

impl std::fmt::Display for RowSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unfiltered() {
            write!(f, "Showing all {} rows", self.total)
        } else {
            write!(f, "Showing {} of {} rows", self.visible, self.total)
        }
    }
}

// =============================================================================
// Load summary
// =============================================================================

/// Per-source statistics for a completed load.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    /// Path the source was read from.
    pub path: PathBuf,

    /// Origin identifier entries were tagged with.
    pub source: String,

    /// Entries parsed from this source.
    pub entry_count: usize,

    /// Lines examined, including the ones that did not match.
    pub lines_scanned: u64,
}

/// Summary statistics for a completed load operation.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    /// Sources that were read successfully, in source-list order.
    pub sources: Vec<SourceSummary>,

    /// Sources that could not be read.
    pub failed_sources: usize,

    /// Total entries in the merged stream.
    pub total_entries: usize,

    /// Entries whose timestamp could not be interpreted (sorted last).
    pub unparsed_timestamps: usize,

    /// Wall-clock load duration.
    pub duration: Duration,
}
