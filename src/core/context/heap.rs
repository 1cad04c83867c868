use crate::core::algo::RawLock;
use crate::core::context::{ContextHandle, ContextStore, alloc_node, free_node};
use crate::core::error::{Violation, fatal};
use crate::core::logger::{self, TraceEvent};
use crate::core::types::MutexId;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

/// Heap-per-mutex strategy: the mutex owns a single context slot, filled on
/// lock and emptied on unlock.
///
/// Only sound for algorithms whose waiters never outlive the holder's node,
/// i.e. algorithms without a wait queue threaded through the nodes. Every
/// transition is traced.
pub struct HeapContext {
    slot: AtomicPtr<()>,
}

impl HeapContext {
    /// Whether the mutex currently owns a context
    pub fn has_context(&self) -> bool {
        !self.slot.load(Ordering::Acquire).is_null()
    }

    fn publish<N>(&self, mutex: MutexId, handle: &ContextHandle<N>, event: TraceEvent) {
        self.slot
            .store(handle.as_non_null().as_ptr().cast(), Ordering::Release);
        logger::log_event(mutex, Some(handle.addr()), event);
    }
}

// SAFETY: the slot is written only by the thread holding the lock, and the
// node it points to is freed only by that same holder on unlock.
unsafe impl<L: RawLock> ContextStore<L> for HeapContext {
    const INIT: Self = HeapContext {
        slot: AtomicPtr::new(ptr::null_mut()),
    };
    const NAME: &'static str = "heap";

    fn on_init(&self, mutex: MutexId) {
        self.slot.store(ptr::null_mut(), Ordering::Relaxed);
        logger::log_event(mutex, None, TraceEvent::Init);
    }

    fn on_destroy(&self, mutex: MutexId) {
        let leftover = self.slot.swap(ptr::null_mut(), Ordering::AcqRel);
        if let Some(node) = NonNull::new(leftover.cast::<L::Node>()) {
            logger::log_event(mutex, Some(node.as_ptr() as usize), TraceEvent::DestroyWithContext);
            // SAFETY: a context left in the slot belongs to nobody any more.
            unsafe { free_node(node) };
        }
        logger::log_event(mutex, None, TraceEvent::Destroy);
    }

    fn acquire_context(&self, _mutex: MutexId) -> ContextHandle<L::Node> {
        ContextHandle::new(alloc_node::<L::Node>(), None)
    }

    fn commit_context(&self, mutex: MutexId, handle: &ContextHandle<L::Node>) {
        self.publish(mutex, handle, TraceEvent::Lock);
    }

    fn commit_try_context(&self, mutex: MutexId, handle: &ContextHandle<L::Node>) {
        self.publish(mutex, handle, TraceEvent::TryLockAcquired);
    }

    fn abandon_context(&self, mutex: MutexId, handle: ContextHandle<L::Node>) {
        let addr = handle.addr();
        // SAFETY: the failed tryacquire never queued the node.
        unsafe { free_node(handle.as_non_null()) };
        logger::log_event(mutex, Some(addr), TraceEvent::TryLockFailed);
    }

    fn current_context(&self, mutex: MutexId) -> ContextHandle<L::Node> {
        let node = self.slot.swap(ptr::null_mut(), Ordering::AcqRel);
        match NonNull::new(node.cast::<L::Node>()) {
            Some(node) => ContextHandle::new(node, None),
            None => fatal(Some(mutex), Violation::MissingContext),
        }
    }

    fn release_context(&self, mutex: MutexId, handle: ContextHandle<L::Node>) {
        let addr = handle.addr();
        // SAFETY: the release is complete and the slot no longer points here.
        unsafe { free_node(handle.as_non_null()) };
        logger::log_event(mutex, Some(addr), TraceEvent::Unlock);
    }
}
