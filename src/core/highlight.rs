// MecmLog - core/highlight.rs
//
// Locating search matches inside a field so the presentation layer can mark
// them. Produces byte ranges only; formatting is the renderer's job.

use crate::core::filter::{compile_search_pattern, SearchMode};
use regex::{Regex, RegexBuilder};
use std::ops::Range;

/// Compiled highlighter for one search term.
#[derive(Debug, Clone)]
pub struct Highlighter {
    regex: Option<Regex>,
}

impl Highlighter {
    /// Build a highlighter for `term` as interpreted under `mode`.
    ///
    /// A term that cannot be compiled yields a highlighter that marks
    /// nothing; the rows it applies to were already filtered, so this only
    /// loses the marks, never the rows.
    pub fn new(term: &str, mode: SearchMode) -> Self {
        if term.is_empty() {
            return Self { regex: None };
        }
        let regex = match mode {
            SearchMode::Literal => RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
                .ok(),
            SearchMode::Regex => compile_search_pattern(term).ok(),
        };
        Self { regex }
    }

    /// Non-empty match ranges in `text`, in order, non-overlapping.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        match &self.regex {
            Some(re) => re
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(|m| m.range())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Split `text` into `(is_match, segment)` pieces covering all of it.
    pub fn segments<'t>(&self, text: &'t str) -> Vec<(bool, &'t str)> {
        let mut out = Vec::new();
        let mut cursor = 0;
        for span in self.spans(text) {
            if span.start > cursor {
                out.push((false, &text[cursor..span.start]));
            }
            out.push((true, &text[span.clone()]));
            cursor = span.end;
        }
        if cursor < text.len() {
            out.push((false, &text[cursor..]));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_spans_case_insensitive() {
        let h = Highlighter::new("disk", SearchMode::Literal);
        assert_eq!(h.spans("Disk full; DISK offline"), vec![0..4, 11..15]);
    }

    #[test]
    fn test_literal_metacharacters_are_escaped() {
        let h = Highlighter::new("a.b(", SearchMode::Literal);
        assert_eq!(h.spans("axb( a.b("), vec![5..9]);
    }

    #[test]
    fn test_regex_spans() {
        let h = Highlighter::new("fail(ed|ure)", SearchMode::Regex);
        assert_eq!(h.spans("failed then Failure"), vec![0..6, 12..19]);
    }

    #[test]
    fn test_empty_matches_are_dropped() {
        let h = Highlighter::new("x*", SearchMode::Regex);
        assert_eq!(h.spans("abxxc"), vec![2..4]);
    }

    #[test]
    fn test_invalid_pattern_marks_nothing() {
        let h = Highlighter::new("(", SearchMode::Regex);
        assert!(h.spans("(((").is_empty());
    }

    #[test]
    fn test_segments_cover_text() {
        let h = Highlighter::new("ok", SearchMode::Literal);
        assert_eq!(
            h.segments("is ok, OK?"),
            vec![(false, "is "), (true, "ok"), (false, ", "), (true, "OK"), (false, "?")]
        );
    }
}
