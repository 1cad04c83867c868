//! Context stores: where the per-acquisition node of an algorithm lives.
//!
//! A store is chosen per mutex type at compile time. Each store has a
//! per-mutex part (embedded in the mutex, valid when zeroed) and may keep
//! per-thread state of its own.
//!
//! | Store            | Storage                          | Freed on unlock      |
//! |------------------|----------------------------------|----------------------|
//! | [`ArenaContext`] | per-thread slot array + counter  | counter decrement    |
//! | [`KeyedContext`] | heap block behind a pthread key  | yes, key cleared     |
//! | [`HeapContext`]  | heap block owned by the mutex    | yes                  |
//! | [`NoContext`]    | nothing                          | -                    |

mod arena;
mod heap;
mod keyed;
mod none;

pub use arena::{ArenaContext, MAX_CONTEXTS, arena_depth};
pub use heap::HeapContext;
pub use keyed::KeyedContext;
pub use none::NoContext;

use crate::core::algo::RawLock;
use crate::core::error::{Violation, fatal};
use crate::core::types::MutexId;
use std::alloc::{self, Layout};
use std::cell::Cell;
use std::ptr::{self, NonNull};

/// A context obtained from a store, valid until handed back to it.
pub struct ContextHandle<N> {
    node: NonNull<N>,
    slot: Option<usize>,
}

impl<N> ContextHandle<N> {
    pub(crate) fn new(node: NonNull<N>, slot: Option<usize>) -> Self {
        ContextHandle { node, slot }
    }

    /// The node behind the handle.
    ///
    /// # Safety
    /// The handle must not have been released or abandoned.
    pub unsafe fn node(&self) -> &N {
        // SAFETY: stores only hand out initialised nodes.
        unsafe { self.node.as_ref() }
    }

    /// Address of the node, for diagnostics
    pub fn addr(&self) -> usize {
        self.node.as_ptr() as usize
    }

    /// Arena slot index, for arena handles
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub(crate) fn as_non_null(&self) -> NonNull<N> {
        self.node
    }
}

/// Supplier of per-acquisition contexts for algorithm `L`.
///
/// Lock path: `acquire_context`, algorithm acquire (or tryacquire), then
/// `commit_context` on success or `abandon_context` on a failed try.
/// Unlock path: `current_context`, algorithm release, `release_context`.
///
/// # Safety
/// Implementations must hand out nodes that stay valid and unaliased by
/// other acquisitions until `release_context` or `abandon_context`.
pub unsafe trait ContextStore<L: RawLock>: Sync {
    /// Per-mutex state of an uninitialised mutex
    const INIT: Self;

    /// Name used in diagnostics
    const NAME: &'static str;

    /// Called by the initialising thread, after the lock is constructed
    fn on_init(&self, mutex: MutexId) {
        let _ = mutex;
    }

    /// Called by the destroying thread, before the lock is dropped
    fn on_destroy(&self, mutex: MutexId) {
        let _ = mutex;
    }

    /// Obtain a context for an acquisition that has not happened yet
    fn acquire_context(&self, mutex: MutexId) -> ContextHandle<L::Node>;

    /// The acquisition through `handle` succeeded
    fn commit_context(&self, mutex: MutexId, handle: &ContextHandle<L::Node>);

    /// The tryacquire through `handle` succeeded
    fn commit_try_context(&self, mutex: MutexId, handle: &ContextHandle<L::Node>) {
        <Self as ContextStore<L>>::commit_context(self, mutex, handle);
    }

    /// A tryacquire through `handle` failed; the context was never queued
    fn abandon_context(&self, mutex: MutexId, handle: ContextHandle<L::Node>);

    /// The context of the acquisition about to be released
    fn current_context(&self, mutex: MutexId) -> ContextHandle<L::Node>;

    /// The release through `handle` is complete
    fn release_context(&self, mutex: MutexId, handle: ContextHandle<L::Node>);
}

thread_local! {
    static LIVE_HEAP_CONTEXTS: Cell<isize> = const { Cell::new(0) };
}

/// Heap contexts allocated by this thread and not yet freed.
///
/// Covers the keyed and heap-per-mutex stores. A context freed by the
/// thread-exit destructor is accounted to the exiting thread.
pub fn live_heap_contexts() -> isize {
    LIVE_HEAP_CONTEXTS.with(Cell::get)
}

/// Allocate and default-initialise a node, aborting if memory is exhausted.
pub(crate) fn alloc_node<N: Default>() -> NonNull<N> {
    let layout = Layout::new::<N>();
    let node = if layout.size() == 0 {
        NonNull::dangling()
    } else {
        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc(layout) }.cast::<N>();
        match NonNull::new(raw) {
            Some(node) => node,
            None => fatal(
                None,
                Violation::ContextAllocation {
                    bytes: layout.size(),
                },
            ),
        }
    };
    // SAFETY: freshly allocated, properly aligned, uninitialised.
    unsafe { node.as_ptr().write(N::default()) };
    LIVE_HEAP_CONTEXTS.with(|live| live.set(live.get() + 1));
    node
}

/// Drop and free a node from [`alloc_node`].
///
/// # Safety
/// `node` must come from `alloc_node::<N>` and not be used afterwards.
pub(crate) unsafe fn free_node<N>(node: NonNull<N>) {
    let layout = Layout::new::<N>();
    // SAFETY: caller guarantees exclusive ownership of a live node.
    unsafe {
        ptr::drop_in_place(node.as_ptr());
        if layout.size() != 0 {
            alloc::dealloc(node.as_ptr().cast(), layout);
        }
    }
    LIVE_HEAP_CONTEXTS.with(|live| live.set(live.get() - 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algo::McsNode;

    #[test]
    fn test_alloc_and_free_balance() {
        let before = live_heap_contexts();
        let node = alloc_node::<McsNode>();
        assert_eq!(live_heap_contexts(), before + 1);
        unsafe { free_node(node) };
        assert_eq!(live_heap_contexts(), before);
    }

    #[test]
    fn test_zero_sized_nodes_do_not_allocate() {
        let node = alloc_node::<()>();
        assert_eq!(node, NonNull::dangling());
        unsafe { free_node(node) };
    }
}
