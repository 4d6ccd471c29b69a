// MecmLog - core/facets.rs
//
// Facet catalogue: the distinct values available for each facet category,
// used to populate the selection lists offered to the user.

use crate::core::filter::FacetSelection;
use crate::core::model::{FacetCategory, LogEntry};
use std::collections::HashSet;

/// Distinct values per facet category, in order of first appearance in the
/// (chronologically sorted) entry stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetCatalogue {
    pub sources: Vec<String>,
    pub components: Vec<String>,
    pub types: Vec<String>,
}

impl FacetCatalogue {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        Self {
            sources: distinct(entries, FacetCategory::Source),
            components: distinct(entries, FacetCategory::Component),
            types: distinct(entries, FacetCategory::Type),
        }
    }

    pub fn values(&self, category: FacetCategory) -> &[String] {
        match category {
            FacetCategory::Source => &self.sources,
            FacetCategory::Component => &self.components,
            FacetCategory::Type => &self.types,
        }
    }

    /// Values of `category` containing `query` (case-insensitive). An empty
    /// query returns every value.
    pub fn narrow(&self, category: FacetCategory, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.values(category)
            .iter()
            .filter(|v| v.to_lowercase().contains(&query))
            .map(String::as_str)
            .collect()
    }
}

fn distinct(entries: &[LogEntry], category: FacetCategory) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .map(|e| category.value_of(e))
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// Heading for a facet selector: `"Sources"` with nothing selected,
/// `"Sources (2)"` with two values selected.
pub fn heading(category: FacetCategory, selection: &FacetSelection) -> String {
    match selection.values(category).len() {
        0 => category.title().to_string(),
        n => format!("{} ({n})", category.title()),
    }
}
