//! Diagnostic output for mutrep
//!
//! Context strategies report their transitions here, and every fatal
//! violation passes through on its way to `abort`. By default lines go to
//! stderr in human-readable form; a log file receives JSON lines instead.

mod event_logger;

pub use event_logger::{
    EventLogger, LogEntry, LogTarget, LoggerMode, TraceEvent, init_logger, log_event,
    log_fatal,
};
