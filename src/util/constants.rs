// MecmLog - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "MecmLog";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "MecmLog";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Discovery limits
// =============================================================================

/// Default directory recursion depth. 1 = only the files directly inside the
/// folder, which is how a client's `CCM\Logs` directory is laid out.
pub const DEFAULT_MAX_DEPTH: usize = 1;

/// Hard upper bound on max depth (prevents runaway traversal).
pub const ABSOLUTE_MAX_DEPTH: usize = 50;

/// Minimum sensible value for the max-files limit.
pub const MIN_MAX_FILES: usize = 1;

/// Maximum number of files to discover in a single folder expansion.
pub const DEFAULT_MAX_FILES: usize = 500;

/// Hard upper bound on max files (prevents configuration mistakes).
pub const ABSOLUTE_MAX_FILES: usize = 10_000;

/// Default include glob patterns for log file discovery.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &["*.log"];

/// Path fragment (lower-case, forward slashes) identifying a Configuration
/// Manager client log folder.
pub const CCM_LOGS_PATH_FRAGMENT: &str = "/ccm/logs";

// =============================================================================
// Source reading
// =============================================================================

/// File size threshold in bytes above which sources are memory-mapped
/// instead of read into a heap buffer.
pub const LARGE_SOURCE_THRESHOLD: u64 = 64 * 1024 * 1024; // 64 MB

/// Retry limits for transient I/O errors while reading a source.
pub const READ_MAX_RETRIES: u32 = 3;

/// Backoff delays (ms) between read retries, indexed by attempt.
pub const READ_RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

// =============================================================================
// Filtering
// =============================================================================

/// Quiescence period (ms) a free-text search must observe before a filter
/// pass is dispatched.
pub const DEFAULT_FILTER_DEBOUNCE_MS: u64 = 300;

/// Maximum user-configurable debounce (ms).
pub const MAX_FILTER_DEBOUNCE_MS: u64 = 5_000;

/// Half-width (seconds) of the time-context window around an anchor entry.
pub const DEFAULT_TIME_WINDOW_SECS: i64 = 300;

/// Minimum configurable time window (seconds).
pub const MIN_TIME_WINDOW_SECS: i64 = 1;

/// Maximum configurable time window (seconds).
pub const MAX_TIME_WINDOW_SECS: i64 = 3_600;

/// Compiled size limit for user search patterns. Patterns whose compiled
/// program exceeds this are rejected as invalid rather than evaluated.
pub const MAX_PATTERN_SIZE_BYTES: usize = 1024 * 1024; // 1 MB

/// Interval (ms) at which the interactive loop ticks the controller.
pub const CONTROLLER_TICK_MS: u64 = 25;

// =============================================================================
// Presentation
// =============================================================================

/// Maximum number of rows printed by `:show` in interactive mode.
pub const MAX_INTERACTIVE_ROWS: usize = 200;

/// Maximum facet values listed by `:facets`.
pub const MAX_FACET_VALUES_LISTED: usize = 100;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Export
// =============================================================================

/// Maximum number of entries that can be exported in a single operation.
pub const MAX_EXPORT_ENTRIES: usize = 5_000_000;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
