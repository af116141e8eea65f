//! Global constants for perf-collector.
//!
//! Artifact names, default settings and tool names live here so that the
//! planner, executor and tests agree on them.

// Run defaults
/// Default observation window in seconds
pub const DEFAULT_DURATION_SECS: u64 = 60;

/// Default sampling frequency for call-graph recording (Hz)
pub const DEFAULT_SAMPLE_FREQUENCY: u32 = 999;

/// Default value passed to `--proc-map-timeout` when perf supports it (ms)
pub const DEFAULT_PROC_MAP_TIMEOUT_MS: u64 = 5000;

/// Default name of the monitored agent process
pub const DEFAULT_TARGET_PROCESS: &str = "falcon-sensor";

/// Default working directory, relative to the current directory
pub const DEFAULT_WORK_DIR: &str = "perf-collector-data";

/// Sentinel used when a host identifier cannot be determined
pub const UNSET_IDENTIFIER: &str = "unset";

// Environment overrides
pub const ENV_CID: &str = "PERF_COLLECTOR_CID";
pub const ENV_AID: &str = "PERF_COLLECTOR_AID";

// External tools
pub const PERF_TOOL: &str = "perf";
pub const KALLSYMS_PATH: &str = "/proc/kallsyms";

/// Capability string marking support for process-exec tracing
pub const EXEC_TRACEPOINT: &str = "sched:sched_process_exec";

/// Option advertised by `perf record -h` on kernels/tools that support it
pub const PROC_MAP_TIMEOUT_OPTION: &str = "proc-map-timeout";

// Artifact file names (relative to the working directory)
pub const COUNTERS_ARTIFACT: &str = "perf-stat.txt";
pub const EXEC_DATA_ARTIFACT: &str = "perf-exec.data";
pub const EXEC_REPORT_ARTIFACT: &str = "perf-exec-report.txt";
pub const SYSTEM_DATA_ARTIFACT: &str = "perf-system.data";
pub const SYSTEM_REPORT_ARTIFACT: &str = "perf-system-report.txt";
pub const TARGET_DATA_ARTIFACT: &str = "perf-target.data";
pub const TARGET_REPORT_ARTIFACT: &str = "perf-target-report.txt";
pub const KALLSYMS_ARTIFACT: &str = "kallsyms";
pub const ERRORS_ARTIFACT: &str = "collection-errors.txt";
pub const SUMMARY_ARTIFACT: &str = "collection_summary.json";

// Archive
pub const ARCHIVE_PREFIX: &str = "perf";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Timestamp layout for archive names: `<date>-<time>`
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Chunk size for streaming files into the archive (512KB)
pub const COMPRESSION_CHUNK_SIZE: usize = 512 * 1024;

/// Files above this size are compressed with the fastest level (100MB)
pub const LARGE_FILE_COMPRESSION_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Files that are hashed for the summary are skipped above this size (MB)
pub const MAX_HASH_SIZE_MB: u64 = 512;

// Common file extensions
pub const COMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "gz", "xz", "bz2", "zst", "7z",
];

/// Poll interval while waiting for a child tool to exit (ms)
pub const CHILD_POLL_INTERVAL_MS: u64 = 100;
