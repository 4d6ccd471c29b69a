// MecmLog - core/export.rs
//
// CSV and JSON export of the currently visible log entries.
// Core layer: writes to any Write trait object.

use crate::core::model::LogEntry;
use crate::util::constants::MAX_EXPORT_ENTRIES;
use crate::util::error::ExportError;
use std::io::Write;
use std::path::Path;

fn check_limit(count: usize) -> Result<(), ExportError> {
    if count > MAX_EXPORT_ENTRIES {
        return Err(ExportError::TooManyEntries {
            count,
            max: MAX_EXPORT_ENTRIES,
        });
    }
    Ok(())
}

/// Export entries to CSV.
///
/// Writes: source, timestamp, component, type, thread, line, message
pub fn export_csv<W: Write>(
    entries: &[&LogEntry],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    check_limit(entries.len())?;

    let csv_err = |e| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(["source", "timestamp", "component", "type", "thread", "line", "message"])
        .map_err(csv_err)?;

    for entry in entries {
        csv_writer
            .write_record([
                entry.source.as_str(),
                entry.timestamp.as_str(),
                entry.component.as_str(),
                entry.log_type.label(),
                entry.thread.as_str(),
                entry.line_number.to_string().as_str(),
                entry.message.as_str(),
            ])
            .map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(entries.len())
}

/// Export entries to JSON (array of objects).
pub fn export_json<W: Write>(
    entries: &[&LogEntry],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    check_limit(entries.len())?;
    serde_json::to_writer_pretty(writer, entries).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::LogType;

    fn make_entry(line: u64, message: &str) -> LogEntry {
        LogEntry {
            message: message.to_string(),
            timestamp: "01-15-2024 10:00:00.000+000".to_string(),
            component: "CcmExec".to_string(),
            log_type: LogType::Error,
            thread: "3120".to_string(),
            source: "CcmExec.log".to_string(),
            line_number: line,
        }
    }

    #[test]
    fn test_csv_export() {
        let a = make_entry(1, "Error one");
        let b = make_entry(2, "Error, with comma");
        let mut buf = Vec::new();
        let count = export_csv(&[&a, &b], &mut buf, Path::new("out.csv")).unwrap();
        assert_eq!(count, 2);

        let output = String::from_utf8(buf).unwrap();
        assert!(output.starts_with("source,timestamp,component,type,thread,line,message"));
        assert!(output.contains("CcmExec.log,01-15-2024 10:00:00.000+000,CcmExec,Error,3120,1,Error one"));
        assert!(output.contains("\"Error, with comma\""));
    }

    #[test]
    fn test_json_export_uses_type_key() {
        let a = make_entry(7, "<b>not markup</b>");
        let mut buf = Vec::new();
        let count = export_json(&[&a], &mut buf, Path::new("out.json")).unwrap();
        assert_eq!(count, 1);

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["type"], "Error");
        assert_eq!(value[0]["message"], "<b>not markup</b>");
        assert_eq!(value[0]["line_number"], 7);
    }
}
