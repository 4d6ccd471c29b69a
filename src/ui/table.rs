// MecmLog - ui/table.rs
//
// Terminal rendering of log rows, the row counter and status lines.
//
// Messages come from untrusted log files: control characters are escaped
// before anything reaches the terminal, so a log line can never emit its own
// escape sequences. The only escapes written are the highlight markers
// produced here.

use crate::core::filter::SearchMode;
use crate::core::highlight::Highlighter;
use crate::core::model::{LogEntry, RowSummary, VisibilityResult};
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;

const HIGHLIGHT_ON: &str = "\x1b[7m";
const HIGHLIGHT_OFF: &str = "\x1b[27m";

const TIMESTAMP_WIDTH: usize = 27;
const TYPE_WIDTH: usize = 7;

/// Presentation settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Mark highlight spans with reverse video.
    pub color: bool,
    /// Stop after this many visible rows.
    pub limit: Option<usize>,
}

/// Escape control characters so the text is inert on a terminal.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    if !text.chars().any(char::is_control) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Render one field with its matches marked.
fn render_field(text: &str, highlighter: Option<&Highlighter>, color: bool) -> String {
    match highlighter {
        Some(h) if color => {
            let mut out = String::with_capacity(text.len());
            for (marked, segment) in h.segments(text) {
                let safe = sanitize(segment);
                if marked {
                    out.push_str(HIGHLIGHT_ON);
                    out.push_str(&safe);
                    out.push_str(HIGHLIGHT_OFF);
                } else {
                    out.push_str(&safe);
                }
            }
            out
        }
        _ => sanitize(text).into_owned(),
    }
}

/// Pad a rendered field to `width` visible characters.
fn pad(rendered: String, raw: &str, width: usize) -> String {
    let visible = sanitize(raw).chars().count();
    if visible >= width {
        rendered
    } else {
        rendered + &" ".repeat(width - visible)
    }
}

/// Format one row. `row_number` is the 1-based position in the full stream,
/// which is what `:anchor` refers to.
pub fn format_row(
    row_number: usize,
    entry: &LogEntry,
    highlighter: Option<&Highlighter>,
    color: bool,
) -> String {
    let field = |text: &str| render_field(text, highlighter, color);
    format!(
        "{row_number:>6}  {}  {}  {}  {}  {}",
        pad(field(&entry.timestamp), &entry.timestamp, TIMESTAMP_WIDTH),
        pad(field(entry.log_type.label()), entry.log_type.label(), TYPE_WIDTH),
        field(&entry.source),
        field(&entry.component),
        field(&entry.message),
    )
}

/// Write the visible rows. Returns how many were written.
pub fn render_rows<W: Write>(
    out: &mut W,
    entries: &[LogEntry],
    visibility: &[VisibilityResult],
    mode: SearchMode,
    options: RenderOptions,
) -> io::Result<usize> {
    let mut cache: Option<(Arc<str>, Highlighter)> = None;
    let mut written = 0;

    for (index, (entry, result)) in entries.iter().zip(visibility).enumerate() {
        if !result.visible {
            continue;
        }
        if options.limit.is_some_and(|limit| written >= limit) {
            break;
        }

        let highlighter = match &result.highlight_term {
            Some(term) => {
                let stale = cache.as_ref().map_or(true, |(t, _)| !Arc::ptr_eq(t, term));
                if stale {
                    cache = Some((Arc::clone(term), Highlighter::new(term, mode)));
                }
                cache.as_ref().map(|(_, h)| h)
            }
            None => None,
        };

        writeln!(out, "{}", format_row(index + 1, entry, highlighter, options.color))?;
        written += 1;
    }
    Ok(written)
}

/// The status line under the table: row counter plus whatever the user
/// needs to know about the current filter.
pub fn status_line(
    summary: RowSummary,
    in_progress: bool,
    time_range: Option<&str>,
    pattern_error: Option<&str>,
    pass_failure: Option<&str>,
) -> String {
    let mut line = summary.to_string();
    if in_progress {
        line.push_str("  [filtering...]");
    }
    if let Some(label) = time_range {
        line.push_str("  ");
        line.push_str(label);
    }
    if let Some(err) = pattern_error {
        line.push_str("\n  ! ");
        line.push_str(&sanitize(err));
    }
    if let Some(reason) = pass_failure {
        line.push_str("\n  ! Filter pass failed: ");
        line.push_str(&sanitize(reason));
    }
    line
}
