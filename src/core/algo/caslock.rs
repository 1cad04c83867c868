use crate::core::algo::RawLock;
use crate::core::spin::SpinWait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Test-and-test-and-set spinlock. Context-free.
#[derive(Debug, Default)]
pub struct CasLock {
    locked: AtomicBool,
}

impl CasLock {
    /// Create an unlocked lock
    pub const fn new() -> Self {
        CasLock {
            locked: AtomicBool::new(false),
        }
    }

    /// Try once to take the lock
    pub fn try_lock(&self) -> bool {
        !self.locked.load(Ordering::Relaxed)
            && self
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    /// Spin until the lock is taken
    pub fn lock(&self) {
        let mut wait = SpinWait::new();
        while !self.try_lock() {
            wait.spin();
        }
    }

    /// Release the lock
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Whether some thread holds the lock
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl RawLock for CasLock {
    type Node = ();
    const NAME: &'static str = "caslock";

    fn new() -> Self {
        CasLock::new()
    }

    unsafe fn acquire(&self, _node: &()) {
        self.lock();
    }

    unsafe fn release(&self, _node: &()) {
        self.unlock();
    }

    unsafe fn try_acquire(&self, _node: &()) -> bool {
        self.try_lock()
    }
}
