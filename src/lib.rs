//! # mutrep
//!
//! Pluggable spinlock backends behind one mutex ABI.
//!
//! A [`LazyMutex`] pairs a lock algorithm with a context store: the place
//! where the algorithm's per-acquisition node lives while the lock is held.
//! The mutex is valid in zeroed memory and builds its lock on first use, so
//! it can stand in for C mutexes that are never explicitly initialised.
//!
//! ## Features
//!
//! - Lazy, race-free initialisation and idempotent destruction
//! - Context stores: per-thread arena, pthread key, heap-per-mutex, none
//! - NUMA-aware hierarchical (HMCS) and CNA locks routed by CPU topology
//! - A C ABI, optionally interposing `pthread_mutex_*`
//! - `mutrep-gen`, generating topology constants from a machine description
//!
//! ```
//! use mutrep::McsMutex;
//!
//! let counter = McsMutex::new(0);
//! *counter.lock() += 1;
//! assert_eq!(*counter.lock(), 1);
//! ```

mod core;
pub use crate::core::{
    CasMutex, CnaMutex, FastSlowMutex, HmcsMutex, LazyMutex, LogTarget, McsMutex, Mutrep,
    TicketMutex,
    types::{MutexId, Stage, ThreadId},
};
pub use crate::core::{algo, codegen, context, error, logger, spin, topology};

pub mod ffi;
