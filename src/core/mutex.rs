//! The lazily initialised mutex wrapper.
//!
//! [`LazyMutex`] turns a [`RawLock`] plus a [`ContextStore`] into a mutex
//! that can live in zeroed memory. The lock value is built on first use and
//! torn down by [`LazyMutex::destroy`] (or on drop), after which the mutex
//! is back to its zeroed state and may be used again.

use crate::core::algo::{CasLock, FastSlowLock, McsLock, RawLock, TicketLock};
use crate::core::context::{ArenaContext, ContextStore, NoContext};
use crate::core::spin::SpinWait;
use crate::core::topology::{NumaCnaLock, NumaHmcsLock};
use crate::core::types::{MutexId, Stage};
use parking_lot::lock_api::{self, GuardNoSend};
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

const UNINIT: u32 = Stage::Uninit as u32;
const INITIALIZING: u32 = Stage::Initializing as u32;
const READY: u32 = Stage::Ready as u32;

/// A mutex over lock algorithm `L` whose contexts come from store `S`.
///
/// All-zero memory is a valid, uninitialised `LazyMutex` for every store in
/// this crate. The first `lock`, `unlock`, `trylock`, `init` or `destroy`
/// constructs the lock; exactly one thread does so even under contention.
pub struct LazyMutex<L: RawLock, S: ContextStore<L> = ArenaContext> {
    stage: AtomicU32,
    lock: UnsafeCell<MaybeUninit<L>>,
    store: S,
}

// SAFETY: the lock value is written only by the thread that moved the stage
// to INITIALIZING, and read only after READY was published with release
// ordering. `L` may be dropped by any thread, hence `Send`.
unsafe impl<L: RawLock + Send, S: ContextStore<L>> Sync for LazyMutex<L, S> {}

impl<L: RawLock, S: ContextStore<L>> LazyMutex<L, S> {
    /// Create an uninitialised mutex
    pub const fn new() -> Self {
        LazyMutex {
            stage: AtomicU32::new(UNINIT),
            lock: UnsafeCell::new(MaybeUninit::uninit()),
            store: S::INIT,
        }
    }

    /// Identity of this mutex, used in diagnostics
    pub fn id(&self) -> MutexId {
        MutexId::of(self)
    }

    /// Current initialisation stage
    pub fn stage(&self) -> Stage {
        Stage::from_raw(self.stage.load(Ordering::Acquire))
    }

    /// The per-mutex part of the context store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Force initialisation
    pub fn init(&self) {
        self.ensure_initialized();
    }

    /// Make sure the lock is constructed, constructing it if nobody has.
    #[inline]
    pub fn ensure_initialized(&self) {
        if self.stage.load(Ordering::Acquire) != READY {
            self.initialize_slow();
        }
    }

    #[cold]
    fn initialize_slow(&self) {
        let mut wait = SpinWait::new();
        loop {
            match self.stage.compare_exchange_weak(
                UNINIT,
                INITIALIZING,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // SAFETY: winning the CAS gives exclusive access to the slot.
                    unsafe { (*self.lock.get()).write(L::new()) };
                    self.store.on_init(self.id());
                    self.stage.store(READY, Ordering::Release);
                    return;
                }
                Err(READY) => return,
                Err(INITIALIZING) => wait.spin(),
                // Spurious failure of the weak CAS.
                Err(_) => {}
            }
        }
    }

    /// Tear the lock down, returning the mutex to its uninitialised state.
    ///
    /// Concurrent calls are allowed; only one of the threads that observe the
    /// ready lock runs the teardown, the others return.
    ///
    /// # Safety
    /// No thread may hold or wait for the mutex, and no thread may lock it
    /// until this call returns.
    pub unsafe fn destroy(&self) {
        self.ensure_initialized();
        if self
            .stage
            .compare_exchange(READY, INITIALIZING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        // SAFETY: winning the CAS gives exclusive access to the ready lock.
        unsafe { self.teardown() };
        self.stage.store(UNINIT, Ordering::Release);
    }

    /// # Safety
    /// The lock must be constructed and exclusively owned by the caller.
    unsafe fn teardown(&self) {
        self.store.on_destroy(self.id());
        // SAFETY: forwarded caller contract.
        unsafe {
            let lock = (*self.lock.get()).assume_init_mut();
            lock.destroy();
            ptr::drop_in_place(lock);
        }
    }

    /// # Safety
    /// The stage must be READY.
    #[inline]
    unsafe fn raw(&self) -> &L {
        // SAFETY: READY publishes a constructed lock.
        unsafe { (*self.lock.get()).assume_init_ref() }
    }

    /// Acquire the mutex, spinning until it is held
    pub fn lock(&self) {
        self.ensure_initialized();
        let id = self.id();
        let handle = self.store.acquire_context(id);
        // SAFETY: the store keeps the node in place until it is released.
        unsafe { self.raw().acquire(handle.node()) };
        self.store.commit_context(id, &handle);
    }

    /// Release the mutex.
    ///
    /// # Safety
    /// The calling thread must hold the mutex. For the arena store the
    /// mutex must also be the one this thread locked most recently.
    pub unsafe fn unlock(&self) {
        self.ensure_initialized();
        let id = self.id();
        let handle = self.store.current_context(id);
        // SAFETY: the handle is the one this thread acquired with.
        unsafe { self.raw().release(handle.node()) };
        self.store.release_context(id, handle);
    }

    /// Try to acquire the mutex without waiting.
    ///
    /// On failure no context stays behind: no arena slot is claimed, no heap
    /// block is live and no key association remains.
    pub fn trylock(&self) -> bool {
        self.ensure_initialized();
        let id = self.id();
        let handle = self.store.acquire_context(id);
        // SAFETY: the node is either committed or abandoned right below.
        if unsafe { self.raw().try_acquire(handle.node()) } {
            self.store.commit_try_context(id, &handle);
            true
        } else {
            self.store.abandon_context(id, handle);
            false
        }
    }
}

impl<L: RawLock, S: ContextStore<L>> Default for LazyMutex<L, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: RawLock, S: ContextStore<L>> Drop for LazyMutex<L, S> {
    fn drop(&mut self) {
        if *self.stage.get_mut() == READY {
            // SAFETY: `&mut self` rules out every other user.
            unsafe { self.teardown() };
            *self.stage.get_mut() = UNINIT;
        }
    }
}

impl<L: RawLock, S: ContextStore<L>> fmt::Debug for LazyMutex<L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyMutex")
            .field("id", &self.id())
            .field("lock", &L::NAME)
            .field("store", &S::NAME)
            .field("stage", &self.stage())
            .finish()
    }
}

unsafe impl<L: RawLock + Send, S: ContextStore<L>> lock_api::RawMutex for LazyMutex<L, S> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    // Arena and keyed contexts belong to the locking thread.
    type GuardMarker = GuardNoSend;

    fn lock(&self) {
        LazyMutex::lock(self);
    }

    fn try_lock(&self) -> bool {
        self.trylock()
    }

    unsafe fn unlock(&self) {
        // SAFETY: lock_api only unlocks from the guard's owner.
        unsafe { LazyMutex::unlock(self) }
    }
}

/// MCS queue lock with per-thread arena contexts
pub type McsMutex<T> = lock_api::Mutex<LazyMutex<McsLock, ArenaContext>, T>;
/// Test-and-test-and-set spinlock
pub type CasMutex<T> = lock_api::Mutex<LazyMutex<CasLock, NoContext>, T>;
/// FIFO ticket lock
pub type TicketMutex<T> = lock_api::Mutex<LazyMutex<TicketLock, NoContext>, T>;
/// CAS fast path with an MCS-queued slow path
pub type FastSlowMutex<T> = lock_api::Mutex<LazyMutex<FastSlowLock, NoContext>, T>;
/// Hierarchical lock over the machine topology
pub type HmcsMutex<T> = lock_api::Mutex<LazyMutex<NumaHmcsLock, ArenaContext>, T>;
/// NUMA-hinted queue lock over the machine topology
pub type CnaMutex<T> = lock_api::Mutex<LazyMutex<NumaCnaLock, ArenaContext>, T>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{HeapContext, KeyedContext, arena_depth, live_heap_contexts};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_zeroed_storage_is_uninitialised() {
        let mutex: LazyMutex<McsLock> = unsafe { std::mem::zeroed() };
        assert_eq!(mutex.stage(), Stage::Uninit);
        mutex.lock();
        assert_eq!(mutex.stage(), Stage::Ready);
        unsafe { mutex.unlock() };
    }

    #[test]
    fn test_trylock_on_held_mutex_fails_without_context() {
        let mutex = LazyMutex::<McsLock>::new();
        mutex.lock();
        assert_eq!(arena_depth(), 1);
        thread::scope(|s| {
            s.spawn(|| {
                assert!(!mutex.trylock());
                assert_eq!(arena_depth(), 0);
            });
        });
        unsafe { mutex.unlock() };
        assert_eq!(arena_depth(), 0);
        assert!(mutex.trylock());
        assert_eq!(arena_depth(), 1);
        unsafe { mutex.unlock() };
    }

    #[test]
    fn test_destroy_then_reuse() {
        let mutex = LazyMutex::<TicketLock, NoContext>::new();
        mutex.lock();
        unsafe { mutex.unlock() };
        unsafe { mutex.destroy() };
        assert_eq!(mutex.stage(), Stage::Uninit);
        assert!(mutex.trylock());
        assert_eq!(mutex.stage(), Stage::Ready);
        unsafe { mutex.unlock() };
    }

    #[test]
    fn test_destroy_of_fresh_mutex_initialises_first() {
        let mutex = LazyMutex::<CasLock, NoContext>::new();
        unsafe { mutex.destroy() };
        assert_eq!(mutex.stage(), Stage::Uninit);
    }

    #[test]
    fn test_keyed_and_heap_stores_leave_nothing_behind() {
        let keyed = LazyMutex::<McsLock, KeyedContext>::new();
        let heap = LazyMutex::<CasLock, HeapContext>::new();
        let before = live_heap_contexts();

        keyed.lock();
        heap.lock();
        assert!(keyed.store().has_context());
        assert!(heap.store().has_context());
        unsafe {
            heap.unlock();
            keyed.unlock();
        }
        assert!(!keyed.store().has_context());
        assert!(!heap.store().has_context());
        assert_eq!(live_heap_contexts(), before);
    }

    #[test]
    fn test_guarded_counter() {
        let counter = Arc::new(McsMutex::new(0usize));
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut guard = counter.lock();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        *guard += 1;
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*counter.lock(), 4000);
    }

    #[test]
    fn test_debug_names_lock_and_store() {
        let mutex = LazyMutex::<FastSlowLock, NoContext>::new();
        let text = format!("{mutex:?}");
        assert!(text.contains("fastslowlock"));
        assert!(text.contains("none"));
        assert!(text.contains("Uninit"));
    }
}
