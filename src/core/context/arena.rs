use crate::core::algo::RawLock;
use crate::core::context::{ContextHandle, ContextStore};
use crate::core::error::{Violation, fatal};
use crate::core::types::MutexId;
use std::cell::{Cell, UnsafeCell};
use std::mem::{MaybeUninit, align_of, size_of};
use std::ptr::{self, NonNull};

/// Maximum number of locks a thread may hold at once through the arena
pub const MAX_CONTEXTS: usize = 16;

const SLOT_SIZE: usize = 64;
const SLOT_ALIGN: usize = 64;

#[repr(C, align(64))]
struct Slot([MaybeUninit<u8>; SLOT_SIZE]);

/// Per-thread stack of context slots.
///
/// Only the owning thread moves `depth`; other threads may touch a slot's
/// node while it is queued in a lock, which is why slots sit in `UnsafeCell`.
struct Arena {
    slots: [UnsafeCell<Slot>; MAX_CONTEXTS],
    depth: Cell<usize>,
}

impl Arena {
    fn slot<N>(&self, index: usize) -> NonNull<N> {
        // SAFETY: `UnsafeCell::get` never returns null.
        unsafe { NonNull::new_unchecked(self.slots[index].get().cast::<N>()) }
    }
}

thread_local! {
    static ARENA: Arena = const {
        Arena {
            slots: [const { UnsafeCell::new(Slot([MaybeUninit::uninit(); SLOT_SIZE])) }; MAX_CONTEXTS],
            depth: Cell::new(0),
        }
    };
}

/// Number of arena contexts the current thread holds
pub fn arena_depth() -> usize {
    ARENA.with(|arena| arena.depth.get())
}

/// Stack-array strategy: contexts come from a fixed per-thread arena indexed
/// by the thread's nesting depth, so locks held by one thread nest LIFO.
///
/// The depth is raised when a context is handed out and lowered when it is
/// released or abandoned.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArenaContext;

// SAFETY: a slot is handed out once per depth level and reused only after the
// acquisition holding it was released or abandoned.
unsafe impl<L: RawLock> ContextStore<L> for ArenaContext {
    const INIT: Self = ArenaContext;
    const NAME: &'static str = "arena";

    fn acquire_context(&self, mutex: MutexId) -> ContextHandle<L::Node> {
        const {
            assert!(size_of::<L::Node>() <= SLOT_SIZE, "lock node does not fit an arena slot");
            assert!(align_of::<L::Node>() <= SLOT_ALIGN, "lock node is over-aligned for an arena slot");
        }
        ARENA.with(|arena| {
            let depth = arena.depth.get();
            if depth >= MAX_CONTEXTS {
                fatal(Some(mutex), Violation::NestingExceeded { max: MAX_CONTEXTS });
            }
            // Claim the slot before the algorithm runs: a lock taken while
            // this acquisition is in progress must land on the next slot.
            arena.depth.set(depth + 1);
            let node = arena.slot::<L::Node>(depth);
            // SAFETY: the slot at `depth` is free, sized and aligned for the node.
            unsafe { node.as_ptr().write(L::Node::default()) };
            ContextHandle::new(node, Some(depth))
        })
    }

    fn commit_context(&self, _mutex: MutexId, _handle: &ContextHandle<L::Node>) {}

    fn abandon_context(&self, _mutex: MutexId, handle: ContextHandle<L::Node>) {
        // SAFETY: the node was never queued.
        unsafe { ptr::drop_in_place(handle.as_non_null().as_ptr()) };
        if let Some(index) = handle.slot() {
            ARENA.with(|arena| arena.depth.set(index));
        }
    }

    fn current_context(&self, mutex: MutexId) -> ContextHandle<L::Node> {
        ARENA.with(|arena| {
            let depth = arena.depth.get();
            if depth == 0 {
                fatal(Some(mutex), Violation::UnlockWithoutLock);
            }
            let index = depth - 1;
            ContextHandle::new(arena.slot::<L::Node>(index), Some(index))
        })
    }

    fn release_context(&self, _mutex: MutexId, handle: ContextHandle<L::Node>) {
        // SAFETY: the release is complete, nothing references the node.
        unsafe { ptr::drop_in_place(handle.as_non_null().as_ptr()) };
        if let Some(index) = handle.slot() {
            ARENA.with(|arena| arena.depth.set(index));
        }
    }
}
