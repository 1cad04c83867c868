//! Contract violations and the fail-fast path.
//!
//! Nothing here is recoverable: every [`Violation`] means a caller broke the
//! mutex contract (or the process ran out of memory for a context), so the
//! violation is written to the diagnostic channel and the process aborts.

use crate::core::logger;
use crate::core::types::MutexId;
use serde::Serialize;
use std::fmt;

/// A fatal misuse of the mutex ABI or an unrecoverable resource failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A thread tried to hold more arena contexts than there are slots
    NestingExceeded {
        /// Number of slots in the per-thread arena
        max: usize,
    },
    /// Unlock was called with no outstanding lock on this thread
    UnlockWithoutLock,
    /// Unlock found no context attached to a heap-per-mutex mutex
    MissingContext,
    /// A heap context could not be allocated
    ContextAllocation {
        /// Size of the requested context
        bytes: usize,
    },
    /// The current CPU could not be queried
    CpuQuery {
        /// errno reported by the OS
        errno: i32,
    },
    /// A CPU id maps outside of the routing table
    CpuOutOfRange {
        /// Physical CPU id
        cpu: usize,
        /// Virtual CPU id derived from it
        vcpu: usize,
    },
    /// `trylock` on an algorithm that has no tryacquire
    TryAcquireUnsupported {
        /// Name of the lock algorithm
        lock: &'static str,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NestingExceeded { max } => {
                write!(f, "exceeded maximum nested locks ({max})")
            }
            Violation::UnlockWithoutLock => write!(f, "unlock called without a matching lock"),
            Violation::MissingContext => write!(f, "attempting to unlock mutex with no context"),
            Violation::ContextAllocation { bytes } => {
                write!(f, "failed to allocate {bytes} bytes for a lock context")
            }
            Violation::CpuQuery { errno } => write!(
                f,
                "sched_getcpu failed: {}",
                std::io::Error::from_raw_os_error(*errno)
            ),
            Violation::CpuOutOfRange { cpu, vcpu } => write!(
                f,
                "cpu {cpu} maps to virtual cpu {vcpu}, outside the routing table"
            ),
            Violation::TryAcquireUnsupported { lock } => {
                write!(f, "tryacquire not implemented for {lock}")
            }
        }
    }
}

/// Report `violation` on the diagnostic channel and abort the process.
#[cold]
#[inline(never)]
pub fn fatal(mutex: Option<MutexId>, violation: Violation) -> ! {
    logger::log_fatal(mutex, violation);
    std::process::abort()
}

/// Default body of `try_acquire` for algorithms that cannot try.
#[cold]
pub fn unsupported_try_acquire(lock: &'static str) -> ! {
    fatal(None, Violation::TryAcquireUnsupported { lock })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages() {
        assert_eq!(
            Violation::NestingExceeded { max: 16 }.to_string(),
            "exceeded maximum nested locks (16)"
        );
        assert_eq!(
            Violation::TryAcquireUnsupported { lock: "hmcs" }.to_string(),
            "tryacquire not implemented for hmcs"
        );
    }

    #[test]
    fn test_violation_serializes_with_kind_tag() {
        let json = serde_json::to_value(Violation::CpuOutOfRange { cpu: 3, vcpu: 600 }).unwrap();
        assert_eq!(json["kind"], "cpu_out_of_range");
        assert_eq!(json["vcpu"], 600);
    }
}
