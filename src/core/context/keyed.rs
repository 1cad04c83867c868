use crate::core::algo::RawLock;
use crate::core::context::{ContextHandle, ContextStore, alloc_node, free_node};
use crate::core::error::{Violation, fatal};
use crate::core::logger::{self, TraceEvent};
use crate::core::types::MutexId;
use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::ptr::{self, NonNull};

/// Keyed-TLS strategy: each mutex owns a pthread key, and each thread keeps
/// at most one heap context per mutex behind that key.
///
/// Contexts are created on first use, freed on unlock, and freed by the key's
/// destructor if a thread exits while one is still attached.
///
/// Key creation, deletion and association failures are reported and then
/// ignored; a thread whose context could not be recorded aborts on unlock.
pub struct KeyedContext {
    // Written by the initialising thread before the stage becomes ready.
    key: UnsafeCell<libc::pthread_key_t>,
}

// SAFETY: `key` is only written while the owning mutex is initialising or
// being destroyed, when no other thread can use the mutex.
unsafe impl Sync for KeyedContext {}

impl KeyedContext {
    fn key(&self) -> libc::pthread_key_t {
        // SAFETY: see the `Sync` impl.
        unsafe { *self.key.get() }
    }

    fn associated<N>(&self) -> Option<NonNull<N>> {
        // SAFETY: reading a key slot has no preconditions.
        NonNull::new(unsafe { libc::pthread_getspecific(self.key()) }.cast::<N>())
    }

    fn associate(&self, mutex: MutexId, value: *const c_void) {
        // SAFETY: the key was created in `on_init`.
        let rc = unsafe { libc::pthread_setspecific(self.key(), value) };
        if rc != 0 {
            logger::log_event(
                mutex,
                Some(value as usize),
                TraceEvent::OsFailure {
                    op: "pthread_setspecific",
                    errno: rc,
                },
            );
        }
    }

    /// Whether the calling thread has a context attached to this mutex
    pub fn has_context(&self) -> bool {
        self.associated::<u8>().is_some()
    }
}

unsafe extern "C" fn free_thread_context<N>(ctx: *mut c_void) {
    if let Some(node) = NonNull::new(ctx.cast::<N>()) {
        // SAFETY: only nodes from `alloc_node::<N>` are stored under the key.
        unsafe { free_node(node) };
    }
}

// SAFETY: each thread's context is private to that thread until it is
// queued, and is freed only after its release completed.
unsafe impl<L: RawLock> ContextStore<L> for KeyedContext {
    const INIT: Self = KeyedContext {
        key: UnsafeCell::new(0),
    };
    const NAME: &'static str = "keyed";

    fn on_init(&self, mutex: MutexId) {
        // SAFETY: exclusive access during initialisation.
        let rc = unsafe {
            libc::pthread_key_create(self.key.get(), Some(free_thread_context::<L::Node>))
        };
        if rc != 0 {
            logger::log_event(
                mutex,
                None,
                TraceEvent::OsFailure {
                    op: "pthread_key_create",
                    errno: rc,
                },
            );
        }
    }

    fn on_destroy(&self, mutex: MutexId) {
        // SAFETY: exclusive access during destruction.
        let rc = unsafe { libc::pthread_key_delete(self.key()) };
        if rc != 0 {
            logger::log_event(
                mutex,
                None,
                TraceEvent::OsFailure {
                    op: "pthread_key_delete",
                    errno: rc,
                },
            );
        }
    }

    fn acquire_context(&self, mutex: MutexId) -> ContextHandle<L::Node> {
        let node = match self.associated::<L::Node>() {
            Some(node) => node,
            None => {
                let node = alloc_node::<L::Node>();
                self.associate(mutex, node.as_ptr().cast::<c_void>());
                node
            }
        };
        ContextHandle::new(node, None)
    }

    fn commit_context(&self, _mutex: MutexId, _handle: &ContextHandle<L::Node>) {}

    fn abandon_context(&self, mutex: MutexId, handle: ContextHandle<L::Node>) {
        <KeyedContext as ContextStore<L>>::release_context(self, mutex, handle);
    }

    fn current_context(&self, mutex: MutexId) -> ContextHandle<L::Node> {
        match self.associated::<L::Node>() {
            Some(node) => ContextHandle::new(node, None),
            None => fatal(Some(mutex), Violation::UnlockWithoutLock),
        }
    }

    fn release_context(&self, mutex: MutexId, handle: ContextHandle<L::Node>) {
        // Clear first so the destructor can never see a freed node.
        self.associate(mutex, ptr::null());
        // SAFETY: the node came from `alloc_node` and is no longer queued.
        unsafe { free_node(handle.as_non_null()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::algo::McsLock;
    use crate::core::context::live_heap_contexts;
    use std::thread;

    fn store() -> KeyedContext {
        let store = <KeyedContext as ContextStore<McsLock>>::INIT;
        <KeyedContext as ContextStore<McsLock>>::on_init(&store, MutexId(1));
        store
    }

    #[test]
    fn test_context_is_reused_until_released() {
        let store = store();
        let before = live_heap_contexts();
        let first = <KeyedContext as ContextStore<McsLock>>::acquire_context(&store, MutexId(1));
        assert!(store.has_context());
        let current = <KeyedContext as ContextStore<McsLock>>::current_context(&store, MutexId(1));
        assert_eq!(first.addr(), current.addr());
        assert_eq!(live_heap_contexts(), before + 1);

        <KeyedContext as ContextStore<McsLock>>::release_context(&store, MutexId(1), current);
        assert!(!store.has_context());
        assert_eq!(live_heap_contexts(), before);
        <KeyedContext as ContextStore<McsLock>>::on_destroy(&store, MutexId(1));
    }

    #[test]
    fn test_abandon_clears_association() {
        let store = store();
        let before = live_heap_contexts();
        let handle = <KeyedContext as ContextStore<McsLock>>::acquire_context(&store, MutexId(1));
        <KeyedContext as ContextStore<McsLock>>::abandon_context(&store, MutexId(1), handle);
        assert!(!store.has_context());
        assert_eq!(live_heap_contexts(), before);
        <KeyedContext as ContextStore<McsLock>>::on_destroy(&store, MutexId(1));
    }

    #[test]
    fn test_contexts_are_per_thread() {
        let store = store();
        let _mine = <KeyedContext as ContextStore<McsLock>>::acquire_context(&store, MutexId(1));
        thread::scope(|s| {
            s.spawn(|| assert!(!store.has_context()));
        });
        let mine = <KeyedContext as ContextStore<McsLock>>::current_context(&store, MutexId(1));
        <KeyedContext as ContextStore<McsLock>>::release_context(&store, MutexId(1), mine);
        <KeyedContext as ContextStore<McsLock>>::on_destroy(&store, MutexId(1));
    }

    #[test]
    fn test_thread_exit_frees_attached_context() {
        let store = store();
        thread::scope(|s| {
            s.spawn(|| {
                let _leaked =
                    <KeyedContext as ContextStore<McsLock>>::acquire_context(&store, MutexId(1));
                assert_eq!(live_heap_contexts(), 1);
            });
        });
        // The destructor ran on the exiting thread; nothing is attached here.
        assert!(!store.has_context());
        <KeyedContext as ContextStore<McsLock>>::on_destroy(&store, MutexId(1));
    }
}
