// MecmLog - core/filter.rs
//
// Filter specification building and evaluation.
// All active filters are AND-combined; values within one facet are OR-ed.
// Core layer: pure logic, no I/O or UI dependencies.
//
// `FilterSpec::build` turns the user's current selections into an immutable
// spec, rejecting regex-mode text that does not compile. `execute` evaluates
// a spec over a snapshot of rows and returns one `VisibilityResult` per row,
// in row order, so results can be zipped back against the rendered rows.
//
// Matching a single field cannot fail: the regex crate's matcher is
// infallible and linear-time. A pass that faults anyway (panic) is contained
// by the worker in app::worker.

use crate::core::model::{FacetCategory, LogEntry, LogType, VisibilityResult};
use crate::core::timestamp;
use crate::util::constants;
use crate::util::error::FilterError;
use chrono::NaiveDateTime;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::Arc;

// =============================================================================
// Filter rows (executor input)
// =============================================================================

/// One entry reduced to the values filtering looks at.
///
/// Rows are shared with the worker as an `Arc<[FilterRow]>` snapshot and are
/// never mutated after construction.
#[derive(Debug, Clone)]
pub struct FilterRow {
    pub source: String,
    pub timestamp: String,
    pub component: String,
    pub log_type: LogType,
    pub message: String,

    /// Interpreted timestamp, `None` when the text could not be read.
    pub time: Option<NaiveDateTime>,
}

impl From<&LogEntry> for FilterRow {
    fn from(entry: &LogEntry) -> Self {
        Self {
            source: entry.source.clone(),
            timestamp: entry.timestamp.clone(),
            component: entry.component.clone(),
            log_type: entry.log_type,
            message: entry.message.clone(),
            time: timestamp::interpret(&entry.timestamp),
        }
    }
}

impl FilterRow {
    /// Field values as displayed, in column order. Text search considers
    /// exactly these.
    fn displayed_fields(&self) -> [&str; 5] {
        [
            &self.source,
            &self.timestamp,
            &self.component,
            self.log_type.label(),
            &self.message,
        ]
    }

    fn facet_value(&self, category: FacetCategory) -> &str {
        match category {
            FacetCategory::Source => &self.source,
            FacetCategory::Component => &self.component,
            FacetCategory::Type => self.log_type.label(),
        }
    }
}

/// Build the immutable row snapshot handed to the filter worker.
pub fn snapshot_rows(entries: &[LogEntry]) -> Arc<[FilterRow]> {
    entries.iter().map(FilterRow::from).collect()
}

// =============================================================================
// User selections (builder input)
// =============================================================================

/// How search text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Case-insensitive substring.
    #[default]
    Literal,
    /// Case-insensitive, multi-line regular expression.
    Regex,
}

impl SearchMode {
    pub fn toggled(self) -> Self {
        match self {
            SearchMode::Literal => SearchMode::Regex,
            SearchMode::Regex => SearchMode::Literal,
        }
    }
}

/// Selected values per facet category. An empty set means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSelection {
    pub sources: HashSet<String>,
    pub components: HashSet<String>,
    /// Type labels ("Info", "Warning", ...).
    pub types: HashSet<String>,
}

impl FacetSelection {
    pub fn values(&self, category: FacetCategory) -> &HashSet<String> {
        match category {
            FacetCategory::Source => &self.sources,
            FacetCategory::Component => &self.components,
            FacetCategory::Type => &self.types,
        }
    }

    fn values_mut(&mut self, category: FacetCategory) -> &mut HashSet<String> {
        match category {
            FacetCategory::Source => &mut self.sources,
            FacetCategory::Component => &mut self.components,
            FacetCategory::Type => &mut self.types,
        }
    }

    /// Select `value` if unselected, deselect it otherwise.
    /// Returns whether the value is selected afterwards.
    pub fn toggle(&mut self, category: FacetCategory, value: &str) -> bool {
        let set = self.values_mut(category);
        if set.remove(value) {
            false
        } else {
            set.insert(value.to_string());
            true
        }
    }

    /// Reset one category to "all".
    pub fn clear_category(&mut self, category: FacetCategory) {
        self.values_mut(category).clear();
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.components.is_empty() && self.types.is_empty()
    }

    fn admits(&self, row: &FilterRow) -> bool {
        FacetCategory::all().iter().all(|&category| {
            let set = self.values(category);
            set.is_empty() || set.contains(row.facet_value(category))
        })
    }
}

/// The user's current filter selections, as held by the interaction layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterInputs {
    pub search_text: String,
    pub mode: SearchMode,
    pub facets: FacetSelection,
    /// Timestamp text of the anchor entry, if a time window is active.
    pub anchor: Option<String>,
}

// =============================================================================
// Filter specification
// =============================================================================

/// Compiled search.
#[derive(Debug, Clone)]
enum Search {
    None,
    Literal { lower: String },
    Regex { regex: Regex },
}

/// Symmetric time window around an anchor timestamp.
#[derive(Debug, Clone)]
pub struct TimeAnchor {
    /// Interpreted anchor. `None` makes the window match nothing.
    pub time: Option<NaiveDateTime>,
    /// Half-width of the window in seconds.
    pub window_secs: i64,
}

impl TimeAnchor {
    fn admits(&self, row: &FilterRow) -> bool {
        match (row.time, self.time) {
            (Some(t), Some(anchor)) => timestamp::within_window(t, anchor, self.window_secs),
            _ => false,
        }
    }

    /// Indicator label, when the anchor can be interpreted.
    pub fn label(&self) -> Option<String> {
        self.time
            .map(|anchor| timestamp::window_label(anchor, self.window_secs))
    }
}

/// Immutable snapshot of filtering intent.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    search_text: Arc<str>,
    mode: SearchMode,
    search: Search,
    facets: FacetSelection,
    anchor: Option<TimeAnchor>,
}

impl FilterSpec {
    /// Build a spec from the current selections.
    ///
    /// Fails with `FilterError::InvalidPattern` when regex mode is on and the
    /// search text does not compile. Callers must not dispatch a pass then.
    pub fn build(inputs: &FilterInputs, window_secs: i64) -> Result<Self, FilterError> {
        let text = inputs.search_text.as_str();

        let search = if text.is_empty() {
            Search::None
        } else {
            match inputs.mode {
                SearchMode::Literal => Search::Literal {
                    lower: text.to_lowercase(),
                },
                SearchMode::Regex => Search::Regex {
                    regex: compile_search_pattern(text)?,
                },
            }
        };

        let anchor = inputs.anchor.as_ref().map(|text| TimeAnchor {
            time: timestamp::interpret(text),
            window_secs,
        });

        Ok(Self {
            search_text: Arc::from(text),
            mode: inputs.mode,
            search,
            facets: inputs.facets.clone(),
            anchor,
        })
    }

    /// Spec that shows every row.
    pub fn show_all() -> Self {
        Self {
            search_text: Arc::from(""),
            mode: SearchMode::Literal,
            search: Search::None,
            facets: FacetSelection::default(),
            anchor: None,
        }
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn anchor(&self) -> Option<&TimeAnchor> {
        self.anchor.as_ref()
    }

    /// True when no restriction of any kind is active.
    pub fn is_empty(&self) -> bool {
        matches!(self.search, Search::None) && self.facets.is_empty() && self.anchor.is_none()
    }

    fn matches_search(&self, row: &FilterRow) -> bool {
        match &self.search {
            Search::None => true,
            Search::Literal { lower } => row
                .displayed_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(lower.as_str())),
            Search::Regex { regex } => row
                .displayed_fields()
                .iter()
                .any(|field| regex.is_match(field)),
        }
    }

    /// Decide visibility for one row.
    pub fn matches(&self, row: &FilterRow) -> bool {
        self.facets.admits(row)
            && self.anchor.as_ref().map_or(true, |a| a.admits(row))
            && self.matches_search(row)
    }
}

/// Compile user search text the way regex mode evaluates it.
pub fn compile_search_pattern(pattern: &str) -> Result<Regex, FilterError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .size_limit(constants::MAX_PATTERN_SIZE_BYTES)
        .build()
        .map_err(|e| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e,
        })
}

// =============================================================================
// Execution
// =============================================================================

/// Evaluate `spec` over every row, preserving row order.
pub fn execute(rows: &[FilterRow], spec: &FilterSpec) -> Vec<VisibilityResult> {
    if spec.is_empty() {
        return vec![VisibilityResult::shown(); rows.len()];
    }

    let highlight: Option<Arc<str>> =
        (!spec.search_text.is_empty()).then(|| Arc::clone(&spec.search_text));

    rows.iter()
        .map(|row| {
            if spec.matches(row) {
                VisibilityResult {
                    visible: true,
                    highlight_term: highlight.clone(),
                }
            } else {
                VisibilityResult::hidden()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::RowSummary;

    fn row(source: &str, ts: &str, component: &str, log_type: LogType, message: &str) -> FilterRow {
        FilterRow::from(&LogEntry {
            message: message.to_string(),
            timestamp: ts.to_string(),
            component: component.to_string(),
            log_type,
            thread: "1".to_string(),
            source: source.to_string(),
            line_number: 1,
        })
    }

    fn simple(log_type: LogType, message: &str) -> FilterRow {
        row("CcmExec.log", "01-15-2024 10:00:00.000+000", "CcmExec", log_type, message)
    }

    fn visible(results: &[VisibilityResult]) -> Vec<usize> {
        results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.visible)
            .map(|(i, _)| i)
            .collect()
    }

    fn spec(inputs: &FilterInputs) -> FilterSpec {
        FilterSpec::build(inputs, 300).unwrap()
    }

    #[test]
    fn test_empty_filter_shows_all() {
        let rows = vec![
            simple(LogType::Info, "one"),
            simple(LogType::Error, "two"),
        ];
        let results = execute(&rows, &spec(&FilterInputs::default()));
        assert_eq!(visible(&results), vec![0, 1]);
        assert!(results.iter().all(|r| r.highlight_term.is_none()));
        assert_eq!(RowSummary::from_results(&results).to_string(), "Showing all 2 rows");
    }

    #[test]
    fn test_type_facet_selects_errors_only() {
        let rows = vec![
            simple(LogType::Info, "i1"),
            simple(LogType::Info, "i2"),
            simple(LogType::Warning, "w1"),
            simple(LogType::Error, "e1"),
            simple(LogType::Info, "i3"),
            simple(LogType::Warning, "w2"),
        ];
        let mut inputs = FilterInputs::default();
        inputs.facets.toggle(FacetCategory::Type, "Error");
        let results = execute(&rows, &spec(&inputs));
        assert_eq!(visible(&results), vec![3]);
        assert_eq!(RowSummary::from_results(&results).to_string(), "Showing 1 of 6 rows");
    }

    #[test]
    fn test_facets_or_within_and_across() {
        let rows = vec![
            row("a.log", "01-15-2024 10:00:00.000+000", "X", LogType::Info, "m"),
            row("b.log", "01-15-2024 10:00:00.000+000", "Y", LogType::Info, "m"),
            row("c.log", "01-15-2024 10:00:00.000+000", "X", LogType::Info, "m"),
            row("a.log", "01-15-2024 10:00:00.000+000", "Z", LogType::Info, "m"),
        ];
        let mut inputs = FilterInputs::default();
        inputs.facets.toggle(FacetCategory::Source, "a.log");
        inputs.facets.toggle(FacetCategory::Source, "b.log");
        inputs.facets.toggle(FacetCategory::Component, "X");
        inputs.facets.toggle(FacetCategory::Component, "Y");
        let results = execute(&rows, &spec(&inputs));
        assert_eq!(visible(&results), vec![0, 1]);
    }

    #[test]
    fn test_literal_search_case_insensitive() {
        let rows = vec![
            simple(LogType::Error, "Disk cleanup failed"),
            simple(LogType::Error, "network timeout"),
        ];
        let inputs = FilterInputs {
            search_text: "disk".to_string(),
            ..Default::default()
        };
        let results = execute(&rows, &spec(&inputs));
        assert_eq!(visible(&results), vec![0]);
        assert_eq!(results[0].highlight_term.as_deref(), Some("disk"));
        assert_eq!(results[1].highlight_term, None);
    }

    #[test]
    fn test_literal_search_covers_displayed_fields() {
        let rows = vec![
            row("AppEnforce.log", "01-15-2024 10:00:00.000+000", "AppEnforce", LogType::Info, "m"),
            row("CcmExec.log", "01-15-2024 10:00:00.000+000", "CcmExec", LogType::Warning, "m"),
        ];
        let by = |text: &str| {
            let inputs = FilterInputs {
                search_text: text.to_string(),
                ..Default::default()
            };
            visible(&execute(&rows, &spec(&inputs)))
        };
        assert_eq!(by("appenforce.LOG"), vec![0]);
        assert_eq!(by("warning"), vec![1]);
        assert_eq!(by("01-15-2024"), vec![0, 1]);
    }

    #[test]
    fn test_search_ignores_thread() {
        let entry = LogEntry {
            message: "m".to_string(),
            timestamp: "01-15-2024 10:00:00.000+000".to_string(),
            component: "c".to_string(),
            log_type: LogType::Info,
            thread: "worker-77".to_string(),
            source: "a.log".to_string(),
            line_number: 1,
        };
        let inputs = FilterInputs {
            search_text: "worker-77".to_string(),
            ..Default::default()
        };
        let rows = vec![FilterRow::from(&entry)];
        assert!(visible(&execute(&rows, &spec(&inputs))).is_empty());
    }

    #[test]
    fn test_regex_search() {
        let rows = vec![
            simple(LogType::Error, "Install FAILED with 0x80070005"),
            simple(LogType::Error, "Download failure detected"),
            simple(LogType::Info, "Download complete"),
        ];
        let inputs = FilterInputs {
            search_text: "fail(ed|ure)".to_string(),
            mode: SearchMode::Regex,
            ..Default::default()
        };
        let results = execute(&rows, &spec(&inputs));
        assert_eq!(visible(&results), vec![0, 1]);
        assert_eq!(results[1].highlight_term.as_deref(), Some("fail(ed|ure)"));
    }

    #[test]
    fn test_regex_is_multiline() {
        let rows = vec![simple(LogType::Info, "first line\nsecond line")];
        let inputs = FilterInputs {
            search_text: "^second".to_string(),
            mode: SearchMode::Regex,
            ..Default::default()
        };
        assert_eq!(visible(&execute(&rows, &spec(&inputs))), vec![0]);
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let inputs = FilterInputs {
            search_text: "(".to_string(),
            mode: SearchMode::Regex,
            ..Default::default()
        };
        let err = FilterSpec::build(&inputs, 300).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { ref pattern, .. } if pattern == "("));
    }

    #[test]
    fn test_invalid_regex_text_is_fine_in_literal_mode() {
        let rows = vec![simple(LogType::Info, "value (unbalanced")];
        let inputs = FilterInputs {
            search_text: "(".to_string(),
            ..Default::default()
        };
        assert_eq!(visible(&execute(&rows, &spec(&inputs))), vec![0]);
    }

    #[test]
    fn test_time_anchor_window_inclusive() {
        let rows = vec![
            simple(LogType::Info, "anchor"),
            row("a.log", "01-15-2024 10:05:00.000+000", "c", LogType::Info, "plus 300"),
            row("a.log", "01-15-2024 10:05:01.000+000", "c", LogType::Info, "plus 301"),
            row("a.log", "01-15-2024 09:55:00.000+000", "c", LogType::Info, "minus 300"),
            row("a.log", "garbage", "c", LogType::Info, "undated"),
        ];
        let inputs = FilterInputs {
            anchor: Some("01-15-2024 10:00:00.000+000".to_string()),
            ..Default::default()
        };
        let results = execute(&rows, &spec(&inputs));
        assert_eq!(visible(&results), vec![0, 1, 3]);
    }

    #[test]
    fn test_time_anchor_combines_with_search() {
        let rows = vec![
            simple(LogType::Info, "disk check"),
            simple(LogType::Info, "network check"),
            row("a.log", "01-15-2024 11:00:00.000+000", "c", LogType::Info, "disk later"),
        ];
        let inputs = FilterInputs {
            search_text: "disk".to_string(),
            anchor: Some("01-15-2024 10:00:00.000+000".to_string()),
            ..Default::default()
        };
        assert_eq!(visible(&execute(&rows, &spec(&inputs))), vec![0]);
    }

    #[test]
    fn test_uninterpretable_anchor_matches_nothing() {
        let rows = vec![simple(LogType::Info, "m")];
        let inputs = FilterInputs {
            anchor: Some("whenever".to_string()),
            ..Default::default()
        };
        let built = spec(&inputs);
        assert!(built.anchor().unwrap().label().is_none());
        assert!(visible(&execute(&rows, &built)).is_empty());
    }

    #[test]
    fn test_facet_toggle_round_trip() {
        let mut facets = FacetSelection::default();
        assert!(facets.toggle(FacetCategory::Component, "X"));
        assert!(!facets.is_empty());
        assert!(!facets.toggle(FacetCategory::Component, "X"));
        assert!(facets.is_empty());
    }
}
