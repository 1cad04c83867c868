//! Underlying lock algorithms
//!
//! The mutex wrapper treats the algorithm as an opaque collaborator: a lock
//! value plus an optional per-acquisition node. Whether the algorithm needs a
//! node is a property of its type: context-free algorithms use `()`.
//!
//! The implementations in this module are compact reference algorithms so the
//! composition layer can run on its own; any type implementing [`RawLock`]
//! can replace them.

pub mod caslock;
pub mod cnalock;
pub mod cohort;
pub mod fastslow;
pub mod mcslock;
pub mod ticketlock;

pub use caslock::CasLock;
pub use cnalock::{CnaLock, CnaNode};
pub use cohort::CohortNode;
pub use fastslow::FastSlowLock;
pub use mcslock::{McsLock, McsNode};
pub use ticketlock::TicketLock;

use crate::core::error::unsupported_try_acquire;

/// A spinlock algorithm as seen by the mutex wrapper.
///
/// The lock value is built with [`RawLock::new`] the first time its mutex is
/// used and dropped after [`RawLock::destroy`].
pub trait RawLock: Sync + Sized {
    /// Per-acquisition record threaded through the algorithm's queues.
    ///
    /// `()` for algorithms that take no node.
    type Node: Default;

    /// Name used in diagnostics
    const NAME: &'static str;

    /// Construct an unlocked lock
    fn new() -> Self;

    /// Algorithm-specific teardown, run once before the lock is dropped
    fn destroy(&mut self) {}

    /// Acquire the lock, spinning until it is held.
    ///
    /// # Safety
    /// `node` must stay at the same address, and must not be handed to any
    /// other acquisition, until the matching [`RawLock::release`] returns.
    unsafe fn acquire(&self, node: &Self::Node);

    /// Release the lock.
    ///
    /// # Safety
    /// The calling thread must hold the lock, acquired with this same `node`.
    unsafe fn release(&self, node: &Self::Node);

    /// Try to acquire the lock without waiting.
    ///
    /// Algorithms without a tryacquire abort the process.
    ///
    /// # Safety
    /// Same as [`RawLock::acquire`]. On failure the node was not queued and
    /// may be reused or freed immediately.
    unsafe fn try_acquire(&self, node: &Self::Node) -> bool {
        let _ = node;
        unsupported_try_acquire(Self::NAME)
    }
}
