use crate::core::error::Violation;
use crate::core::types::{MutexId, ThreadId, get_current_thread_id};
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A mutex or context transition worth reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// The mutex was constructed
    Init,
    /// The mutex was torn down
    Destroy,
    /// The mutex was torn down while a context was still attached
    DestroyWithContext,
    /// The lock was acquired with the given context
    Lock,
    /// The lock was released and its context freed
    Unlock,
    /// `trylock` succeeded
    TryLockAcquired,
    /// `trylock` failed and its temporary context was freed
    TryLockFailed,
    /// An OS facility failed; the operation carried on
    OsFailure {
        /// Name of the failing call
        op: &'static str,
        /// errno or return code
        errno: i32,
    },
    /// A contract violation; the process is about to abort
    Fatal {
        /// What went wrong
        violation: Violation,
    },
}

/// Structure for a single log entry
#[derive(Debug, Serialize)]
pub struct LogEntry {
    /// Thread that performed the action
    pub thread_id: ThreadId,
    /// Mutex that was involved, when there is one
    pub mutex: Option<MutexId>,
    /// Address of the context involved, when there is one
    pub context: Option<usize>,
    /// What happened
    #[serde(flatten)]
    pub event: TraceEvent,
    /// Seconds since Unix Epoch with microsecond precision
    pub timestamp: f64,
}

impl LogEntry {
    /// Render the entry as one human-readable line
    pub fn describe(&self) -> String {
        let mutex = self
            .mutex
            .map_or_else(|| "<none>".to_string(), |m| m.to_string());
        let context = self
            .context
            .map_or_else(|| "<none>".to_string(), |c| format!("{c:#x}"));
        match self.event {
            TraceEvent::Init => format!("Initialized mutex: {mutex}"),
            TraceEvent::Destroy => format!("Destroyed mutex: {mutex}"),
            TraceEvent::DestroyWithContext => {
                format!("Warning: destroying mutex {mutex} with non-null context: {context}")
            }
            TraceEvent::Lock => format!("Locked mutex: {mutex} with context: {context}"),
            TraceEvent::Unlock => format!("Unlocked mutex: {mutex} and freed context: {context}"),
            TraceEvent::TryLockAcquired => {
                format!("Successfully trylocked mutex: {mutex} with context: {context}")
            }
            TraceEvent::TryLockFailed => {
                format!("Failed to trylock mutex: {mutex}, freed temporary context: {context}")
            }
            TraceEvent::OsFailure { op, errno } => format!(
                "{op} failed for mutex {mutex}: {}",
                std::io::Error::from_raw_os_error(errno)
            ),
            TraceEvent::Fatal { violation } => format!("Fatal: {violation} (mutex {mutex})"),
        }
    }
}

/// Where diagnostics should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Drop everything except fatal errors
    Off,
    /// Human-readable lines on the process error stream
    Stderr,
    /// JSON lines appended to a file
    File(PathBuf),
}

/// Determines how the logger should operate
#[derive(Debug)]
pub enum LoggerMode {
    /// Logging is disabled entirely
    Disabled,
    /// Write human-readable lines to stderr
    Stderr,
    /// Log to the specified file
    ToFile(File),
}

/// Logger for recording mutex and context transitions
pub struct EventLogger {
    mode: LoggerMode,
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::stderr()
    }
}

impl EventLogger {
    /// Create a new logger with logging disabled
    pub fn new() -> Self {
        EventLogger {
            mode: LoggerMode::Disabled,
        }
    }

    /// Create a logger writing human-readable lines to stderr
    pub fn stderr() -> Self {
        EventLogger {
            mode: LoggerMode::Stderr,
        }
    }

    /// Create a new logger that writes to the specified file
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("Failed to open log file")?;

        Ok(EventLogger {
            mode: LoggerMode::ToFile(file),
        })
    }

    /// Build a logger for `target`
    pub fn for_target(target: &LogTarget) -> Result<Self> {
        match target {
            LogTarget::Off => Ok(Self::new()),
            LogTarget::Stderr => Ok(Self::stderr()),
            LogTarget::File(path) => Self::with_file(path),
        }
    }

    /// Log an entry based on the configured mode
    pub fn log_entry(&self, entry: &LogEntry) {
        match self.mode {
            LoggerMode::Disabled => {}
            LoggerMode::Stderr => {
                let _ = writeln!(std::io::stderr().lock(), "{}", entry.describe());
            }
            LoggerMode::ToFile(ref file) => {
                let mut file = file;
                if let Ok(json) = serde_json::to_string(entry) {
                    let _ = writeln!(file, "{}", json);
                    let _ = file.flush();
                }
            }
        }
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, LoggerMode::Disabled)
    }

    fn writes_stderr(&self) -> bool {
        matches!(self.mode, LoggerMode::Stderr)
    }
}

// Global logger instance
lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<EventLogger> = Mutex::new(EventLogger::stderr());
}

fn entry(mutex: Option<MutexId>, context: Option<usize>, event: TraceEvent) -> LogEntry {
    let now = Utc::now();
    let timestamp = now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0;
    LogEntry {
        thread_id: get_current_thread_id(),
        mutex,
        context,
        event,
        timestamp,
    }
}

/// Point the global logger at `target`
pub fn init_logger(target: &LogTarget) -> Result<()> {
    let logger = EventLogger::for_target(target).context("Failed to create logger")?;
    *GLOBAL_LOGGER.lock() = logger;
    Ok(())
}

/// Log an event to the global logger (if enabled)
pub fn log_event(mutex: MutexId, context: Option<usize>, event: TraceEvent) {
    let logger = GLOBAL_LOGGER.lock();
    if logger.is_enabled() {
        logger.log_entry(&entry(Some(mutex), context, event));
    }
}

/// Log a fatal violation. Fatal errors always reach stderr, whatever the mode.
pub fn log_fatal(mutex: Option<MutexId>, violation: Violation) {
    let entry = entry(mutex, None, TraceEvent::Fatal { violation });
    let logger = GLOBAL_LOGGER.lock();
    logger.log_entry(&entry);
    if !logger.writes_stderr() {
        let _ = writeln!(std::io::stderr().lock(), "mutrep: {}", entry.describe());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_describe_matches_trace_wording() {
        let e = LogEntry {
            thread_id: 1,
            mutex: Some(MutexId(0x10)),
            context: Some(0x20),
            event: TraceEvent::Lock,
            timestamp: 0.0,
        };
        assert_eq!(e.describe(), "Locked mutex: 0x10 with context: 0x20");
    }

    #[test]
    fn test_file_logger_writes_json_lines() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let logger = EventLogger::with_file(file.path()).unwrap();
        logger.log_entry(&entry(Some(MutexId(0x40)), Some(0x80), TraceEvent::Unlock));
        logger.log_entry(&entry(
            Some(MutexId(0x40)),
            None,
            TraceEvent::OsFailure {
                op: "pthread_key_delete",
                errno: 22,
            },
        ));

        let mut contents = String::new();
        File::open(file.path())
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "unlock");
        assert_eq!(lines[0]["mutex"], 0x40);
        assert_eq!(lines[1]["event"], "os_failure");
        assert_eq!(lines[1]["op"], "pthread_key_delete");
    }

    #[test]
    fn test_disabled_logger() {
        assert!(!EventLogger::new().is_enabled());
        assert!(EventLogger::stderr().is_enabled());
    }
}
