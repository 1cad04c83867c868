use crate::core::algo::{CasLock, McsLock, McsNode, RawLock};

/// Hybrid lock: an uncontended CAS fast path, with contenders queued on an
/// MCS lock before they race for the CAS word.
///
/// Only the head of the MCS queue ever spins on the CAS word. The MCS node is
/// needed only while queueing, so it lives on the stack of `acquire` and the
/// lock is context-free from the wrapper's point of view.
#[derive(Debug, Default)]
pub struct FastSlowLock {
    fast: CasLock,
    slow: McsLock,
}

impl RawLock for FastSlowLock {
    type Node = ();
    const NAME: &'static str = "fastslowlock";

    fn new() -> Self {
        FastSlowLock::default()
    }

    unsafe fn acquire(&self, _node: &()) {
        if self.fast.try_lock() {
            return;
        }
        let node = McsNode::default();
        // SAFETY: `node` outlives the slow-path critical section below.
        unsafe {
            self.slow.acquire(&node);
            self.fast.lock();
            self.slow.release(&node);
        }
    }

    unsafe fn release(&self, _node: &()) {
        self.fast.unlock();
    }

    unsafe fn try_acquire(&self, _node: &()) -> bool {
        self.fast.try_lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_path_then_trylock_fails() {
        let lock = <FastSlowLock as RawLock>::new();
        unsafe {
            lock.acquire(&());
            assert!(!lock.try_acquire(&()));
            lock.release(&());
            assert!(lock.try_acquire(&()));
            lock.release(&());
        }
        assert!(!lock.slow.is_locked());
    }
}
