// Core types
pub mod types;

// Diagnostics
pub mod error;
pub mod logger;
pub use logger::{LogTarget, init_logger};

// Lock algorithms and where their contexts live
pub mod algo;
pub mod context;
pub mod spin;

// The mutex wrapper
pub mod mutex;
pub use mutex::{
    CasMutex, CnaMutex, FastSlowMutex, HmcsMutex, LazyMutex, McsMutex, TicketMutex,
};

// Hierarchical topologies and their generator
pub mod codegen;
pub mod topology;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Environment variable read by [`Mutrep::from_env`]
pub const LOG_ENV: &str = "MUTREP_LOG";

/// Mutrep configuration struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutrep {
    log: LogTarget,
}

impl Default for Mutrep {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutrep {
    /// Create a new Mutrep with default settings
    ///
    /// By default diagnostics are written to stderr as human-readable lines.
    pub fn new() -> Self {
        Mutrep {
            log: LogTarget::Stderr,
        }
    }

    /// Configure from the `MUTREP_LOG` environment variable.
    ///
    /// `off` silences diagnostics, `stderr` (or an unset variable) keeps the
    /// default, anything else is taken as the path of a JSON-lines log file.
    pub fn from_env() -> Self {
        match env::var_os(LOG_ENV) {
            Some(value) => Mutrep {
                log: parse_log_target(&value.to_string_lossy()),
            },
            None => Self::new(),
        }
    }

    /// Write diagnostics as JSON lines to `path` instead of stderr
    ///
    /// # Arguments
    /// * `path` - Path to the log file, appended to if it exists
    ///
    /// # Returns
    /// The builder for method chaining
    pub fn with_log<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.log = LogTarget::File(path.into());
        self
    }

    /// Drop all diagnostics except fatal errors
    pub fn quiet(mut self) -> Self {
        self.log = LogTarget::Off;
        self
    }

    /// The configured log target
    pub fn log_target(&self) -> &LogTarget {
        &self.log
    }

    /// Apply the configuration
    ///
    /// # Errors
    /// Returns an error if the log file cannot be opened
    pub fn start(self) -> Result<()> {
        init_logger(&self.log).context("Failed to initialize logger")?;
        Ok(())
    }
}

fn parse_log_target(value: &str) -> LogTarget {
    match value.trim() {
        "off" | "none" | "0" => LogTarget::Off,
        "" | "stderr" => LogTarget::Stderr,
        path => LogTarget::File(PathBuf::from(path)),
    }
}
