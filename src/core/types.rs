use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread identifier type
///
/// Uniquely identifies a thread in diagnostic output.
pub type ThreadId = usize;

// Global counter for assigning unique thread IDs
static THREAD_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

// Thread-local storage for each thread's assigned ID
thread_local! {
    static THREAD_ID: ThreadId = {
        // Each thread gets a unique ID once, when this is first accessed
        THREAD_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
    };
}

/// Get a unique identifier of the current thread
/// This will always return the same ID for the lifetime of the thread
pub fn get_current_thread_id() -> ThreadId {
    THREAD_ID.with(|&id| id)
}

/// Identity of a mutex: the address of its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutexId(pub usize);

impl MutexId {
    /// Build the id of the mutex stored at `ptr`.
    pub fn of<T: ?Sized>(ptr: *const T) -> Self {
        MutexId(ptr.cast::<()>() as usize)
    }
}

impl fmt::Display for MutexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Initialization stage of a lazily initialized mutex.
///
/// `Initializing` doubles as "destroy in progress": both transitions hold the
/// tag there while one thread builds or tears down the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum Stage {
    /// No lock has been constructed (also the state of zeroed storage)
    Uninit = 0,
    /// One thread is constructing or destroying the lock
    Initializing = 1,
    /// The lock is constructed and usable
    Ready = 2,
}

impl Stage {
    /// Decode a raw tag value. Unknown values are treated as `Initializing`,
    /// which makes observers wait rather than touch the lock.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Stage::Uninit,
            2 => Stage::Ready,
            _ => Stage::Initializing,
        }
    }
}
