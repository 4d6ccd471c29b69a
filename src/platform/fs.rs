// MecmLog - platform/fs.rs
//
// Filesystem-backed `SourceReader`.
//
// Small files are read into a heap buffer with retries on transient I/O
// errors (WouldBlock, Interrupted, TimedOut) using capped backoff. Files at or
// above LARGE_SOURCE_THRESHOLD are memory-mapped and copied out once, which
// avoids the read-to-end reallocation churn on very large logs.

use crate::core::aggregate::SourceReader;
use crate::util::constants::{LARGE_SOURCE_THRESHOLD, READ_MAX_RETRIES, READ_RETRY_DELAYS_MS};
use crate::util::error::SourceError;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Reads sources from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceReader;

impl SourceReader for FsSourceReader {
    fn read_source(&self, path: &Path) -> Result<Vec<u8>, SourceError> {
        let read_err = |e| SourceError::Read {
            path: path.to_path_buf(),
            source: e,
        };

        let metadata = std::fs::metadata(path).map_err(read_err)?;
        if !metadata.is_file() {
            return Err(SourceError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        if metadata.len() >= LARGE_SOURCE_THRESHOLD {
            tracing::debug!(
                file = %path.display(),
                size = metadata.len(),
                "Large source, memory-mapping"
            );
            read_mapped(path).map_err(read_err)
        } else {
            read_with_retry(path).map_err(read_err)
        }
    }
}

fn read_mapped(path: &Path) -> io::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    // SAFETY: the map is read-only and dropped before returning. A log file
    // truncated by its writer while mapped can fault; that risk is accepted
    // for already-written logs.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    Ok(mmap.to_vec())
}

fn read_with_retry(path: &Path) -> io::Result<Vec<u8>> {
    let mut last_err: Option<io::Error> = None;

    for attempt in 0..READ_MAX_RETRIES {
        match std::fs::read(path) {
            Ok(bytes) => return Ok(bytes),
            Err(e) if is_transient_error(&e) => {
                tracing::debug!(
                    file = %path.display(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient I/O error"
                );
                if let Some(delay) = retry_delay(attempt) {
                    std::thread::sleep(delay);
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::other("Unknown read error")))
}

/// Pause before the attempt after `attempt`; `None` once retries are spent.
fn retry_delay(attempt: u32) -> Option<Duration> {
    if attempt + 1 >= READ_MAX_RETRIES {
        return None;
    }
    READ_RETRY_DELAYS_MS
        .get(attempt as usize)
        .map(|ms| Duration::from_millis(*ms))
}

/// Returns true for transient I/O errors that are worth retrying.
fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}
