// MecmLog - core/aggregate.rs
//
// Multi-source aggregation: read each source through a `SourceReader`, parse
// it, tag entries with their origin, concatenate in source-list order, then
// stable-sort the whole stream chronologically.
//
// Core layer: the filesystem is reached only through the `SourceReader`
// trait, implemented in platform::fs.
//
// Failure policy:
//   - A source that cannot be read contributes nothing. The error is logged
//     at WARN and returned in `Aggregation::failures`; other sources proceed.
//   - Timestamps that cannot be interpreted never fail the sort: those
//     entries go after all dated entries, keeping their concatenation order.

use crate::core::model::{LoadSummary, LogEntry, SourceSummary};
use crate::core::parser;
use crate::core::timestamp;
use crate::util::error::SourceError;
use rayon::prelude::*;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Source text provider: hands back the raw bytes of one source.
///
/// `Sync` because sources are read in parallel.
pub trait SourceReader: Sync {
    fn read_source(&self, path: &Path) -> Result<Vec<u8>, SourceError>;
}

/// Output of a load: the merged, sorted entries plus what went wrong.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// All entries, chronologically ordered.
    pub entries: Vec<LogEntry>,

    /// Sources that could not be read, in source-list order.
    pub failures: Vec<SourceError>,

    /// Load statistics.
    pub summary: LoadSummary,
}

/// Origin identifier for a source path: its final segment, or the whole path
/// when it has none (e.g. `/` or `..`).
pub fn source_id(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Decode raw source bytes to text.
///
/// UTF-16 files (identified by their byte-order mark) are transcoded; all
/// other input is treated as UTF-8 with invalid sequences replaced.
pub fn decode_source(bytes: &[u8]) -> Cow<'_, str> {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest),
        [0xFF, 0xFE, rest @ ..] => Cow::Owned(decode_utf16(rest, u16::from_le_bytes)),
        [0xFE, 0xFF, rest @ ..] => Cow::Owned(decode_utf16(rest, u16::from_be_bytes)),
        _ => String::from_utf8_lossy(bytes),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let pairs = bytes.chunks_exact(2);
    let truncated = !pairs.remainder().is_empty();
    let mut text: String = char::decode_utf16(pairs.map(|pair| unit([pair[0], pair[1]])))
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    // Odd trailing byte: a unit cut off mid-write.
    if truncated {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

/// Read and parse a single source, tagging every entry with its origin.
fn load_source(
    path: &Path,
    reader: &dyn SourceReader,
) -> Result<(Vec<LogEntry>, SourceSummary), SourceError> {
    let bytes = reader.read_source(path)?;
    let text = decode_source(&bytes);
    let result = parser::parse_content(&text);

    let source = source_id(path);
    let mut entries = result.entries;
    for entry in &mut entries {
        entry.source.clone_from(&source);
    }

    tracing::debug!(
        file = %path.display(),
        entries = entries.len(),
        lines = result.lines_processed,
        "Source parsed"
    );

    let summary = SourceSummary {
        path: path.to_path_buf(),
        source,
        entry_count: entries.len(),
        lines_scanned: result.lines_processed,
    };
    Ok((entries, summary))
}

/// Load every source in `paths` and merge them into one chronological stream.
///
/// Sources are read and parsed in parallel; results are collected back in
/// source-list order before concatenation, so tie-breaking is independent of
/// which source finished first.
pub fn aggregate(paths: &[PathBuf], reader: &dyn SourceReader) -> Aggregation {
    let started = Instant::now();

    let loaded: Vec<_> = paths
        .par_iter()
        .map(|path| load_source(path, reader))
        .collect();

    let mut entries = Vec::new();
    let mut failures = Vec::new();
    let mut sources = Vec::new();

    for result in loaded {
        match result {
            Ok((source_entries, summary)) => {
                entries.extend(source_entries);
                sources.push(summary);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Source read failed; continuing without it");
                failures.push(e);
            }
        }
    }

    let unparsed_timestamps = sort_chronologically(&mut entries);

    let summary = LoadSummary {
        failed_sources: failures.len(),
        total_entries: entries.len(),
        unparsed_timestamps,
        sources,
        duration: started.elapsed(),
    };

    tracing::info!(
        sources = summary.sources.len(),
        failed = summary.failed_sources,
        entries = summary.total_entries,
        "Sources aggregated"
    );

    Aggregation {
        entries,
        failures,
        summary,
    }
}

/// Merge newly loaded entries into an existing sorted stream.
///
/// Existing entries come first in the concatenation, so on equal timestamps
/// they stay ahead of the new ones. The input is left untouched; the caller
/// gets a new vector to publish as the next snapshot.
pub fn merge(existing: &[LogEntry], additional: Vec<LogEntry>) -> Vec<LogEntry> {
    let mut merged = Vec::with_capacity(existing.len() + additional.len());
    merged.extend_from_slice(existing);
    merged.extend(additional);
    sort_chronologically(&mut merged);
    merged
}

/// Stable chronological sort. Returns the number of entries whose timestamp
/// could not be interpreted (now at the end of `entries`).
pub fn sort_chronologically(entries: &mut Vec<LogEntry>) -> usize {
    let mut keyed: Vec<_> = std::mem::take(entries)
        .into_par_iter()
        .map(|entry| (timestamp::interpret(&entry.timestamp), entry))
        .collect();

    // par_sort_by is a stable merge sort.
    keyed.par_sort_by(|a, b| timestamp::compare_sort_keys(a.0, b.0));

    let unparsed = keyed.iter().filter(|(key, _)| key.is_none()).count();
    if unparsed > 0 {
        tracing::debug!(unparsed, "Entries with uninterpretable timestamps sorted last");
    }

    entries.extend(keyed.into_iter().map(|(_, entry)| entry));
    unparsed
}
