// MecmLog - core/parser.rs
//
// Line-oriented parsing of Configuration Manager client logs (CMTrace
// format). Core layer: accepts text, never touches the filesystem.
//
// A line carries one entry:
//
//   <![LOG[message]LOG]!><time="14:30:22.123+000" date="01-15-2024"
//       component="CcmExec" context="" type="1" thread="3120" file="ccmexec.cpp:123">
//
// (shown wrapped; on disk it is a single line). Lines that do not match are
// dropped without error: headers, partial writes and binary noise are normal
// in these files.

use crate::core::model::{LogEntry, LogType};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// The one grammar this parser recognises.
///
/// Attribute values are `[^"]*` so an unexpected extra attribute can never be
/// absorbed into a neighbouring value: the line simply fails to match.
const LINE_PATTERN: &str = concat!(
    r#"<!\[LOG\[(?P<message>.*?)\]LOG\]!>"#,
    r#"<time="(?P<time>[^"]*)" date="(?P<date>[^"]*)" component="(?P<component>[^"]*)" "#,
    r#"context="(?P<context>[^"]*)" type="(?P<type>[^"]*)" thread="(?P<thread>[^"]*)" "#,
    r#"file="[^"]*">"#,
);

/// Closing marker a message may never contain.
const MESSAGE_TERMINATOR: &str = "]LOG]!>";

fn line_regex() -> &'static Regex {
    static LINE_RE: OnceLock<Regex> = OnceLock::new();
    LINE_RE.get_or_init(|| Regex::new(LINE_PATTERN).expect("parser: invalid line pattern"))
}

/// Result of parsing one source's full text.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Entries in line order, `source` still empty.
    pub entries: Vec<LogEntry>,

    /// Total lines examined.
    pub lines_processed: u64,
}

/// Parse a single line. Returns `None` for any line not matching the grammar.
///
/// The returned entry has an empty `source` and `line_number` 0; both are
/// filled in by the caller that knows where the line came from.
pub fn parse_line(line: &str) -> Option<LogEntry> {
    let caps = line_regex().captures(line)?;

    let message = field(&caps, "message");
    // The lazy message group stops at the first terminator that is followed by
    // a well-formed attribute tag; a message holding a stray terminator before
    // that point is a malformed line, not an entry.
    if message.contains(MESSAGE_TERMINATOR) {
        return None;
    }

    let date = field(&caps, "date");
    let time = field(&caps, "time");

    Some(LogEntry {
        message: message.to_string(),
        timestamp: format!("{date} {time}"),
        component: field(&caps, "component").to_string(),
        log_type: LogType::from_code(field(&caps, "type")),
        thread: field(&caps, "thread").to_string(),
        source: String::new(),
        line_number: 0,
    })
}

fn field<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map(|m| m.as_str()).unwrap_or("")
}

/// Parse the full text of one source, line by line.
///
/// Both `\n` and `\r\n` line endings are accepted.
pub fn parse_content(content: &str) -> ParseResult {
    let mut entries = Vec::new();
    let mut lines_processed: u64 = 0;

    for (idx, line) in content.lines().enumerate() {
        lines_processed += 1;

        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Some(mut entry) => {
                entry.line_number = (idx as u64) + 1;
                entries.push(entry);
            }
            None => {
                tracing::trace!(
                    line = idx + 1,
                    preview = %preview(line),
                    "Line does not match log grammar, skipped"
                );
            }
        }
    }

    tracing::debug!(
        entries = entries.len(),
        lines = lines_processed,
        "Parsing complete"
    );

    ParseResult {
        entries,
        lines_processed,
    }
}

/// Truncate a line for debug output.
fn preview(line: &str) -> &str {
    let max = crate::util::constants::DEBUG_MAX_LINE_PREVIEW;
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
