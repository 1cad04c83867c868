use crate::core::algo::{McsLock, McsNode, RawLock};
use std::sync::atomic::{AtomicU32, Ordering};

/// Node of a [`CnaLock`]: an MCS node tagged with its waiter's NUMA node
#[derive(Debug, Default)]
pub struct CnaNode {
    mcs: McsNode,
    numa: AtomicU32,
}

impl CnaNode {
    /// NUMA node recorded by the last acquire through this node
    pub fn numa(&self) -> u32 {
        self.numa.load(Ordering::Relaxed)
    }
}

/// Queue lock with the CNA calling convention: every acquire, release and
/// tryacquire carries the caller's NUMA node.
///
/// This reference version keeps the MCS FIFO hand-off and only records the
/// hint; a compact NUMA-aware algorithm can sit behind the same signature.
#[derive(Debug, Default)]
pub struct CnaLock {
    queue: McsLock,
    owner_numa: AtomicU32,
}

impl CnaLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        CnaLock::default()
    }

    /// Acquire on behalf of a thread running on NUMA node `numa`.
    ///
    /// # Safety
    /// Same contract as [`RawLock::acquire`].
    pub unsafe fn acquire(&self, node: &CnaNode, numa: u32) {
        node.numa.store(numa, Ordering::Relaxed);
        // SAFETY: forwarded caller contract.
        unsafe { self.queue.acquire(&node.mcs) };
        self.owner_numa.store(numa, Ordering::Relaxed);
    }

    /// Release on behalf of a thread that acquired on NUMA node `numa`.
    ///
    /// # Safety
    /// Same contract as [`RawLock::release`].
    pub unsafe fn release(&self, node: &CnaNode, numa: u32) {
        debug_assert_eq!(node.numa(), numa);
        // SAFETY: forwarded caller contract.
        unsafe { self.queue.release(&node.mcs) };
    }

    /// Try to acquire without queueing.
    ///
    /// # Safety
    /// Same contract as [`RawLock::try_acquire`].
    pub unsafe fn try_acquire(&self, node: &CnaNode, numa: u32) -> bool {
        node.numa.store(numa, Ordering::Relaxed);
        // SAFETY: forwarded caller contract.
        let acquired = unsafe { self.queue.try_acquire(&node.mcs) };
        if acquired {
            self.owner_numa.store(numa, Ordering::Relaxed);
        }
        acquired
    }

    /// NUMA node of the most recent owner
    pub fn owner_numa(&self) -> u32 {
        self.owner_numa.load(Ordering::Relaxed)
    }

    /// Whether some thread holds or waits for the lock
    pub fn is_locked(&self) -> bool {
        self.queue.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numa_hint_is_recorded() {
        let lock = CnaLock::new();
        let node = CnaNode::default();
        unsafe {
            lock.acquire(&node, 3);
            assert_eq!(node.numa(), 3);
            assert_eq!(lock.owner_numa(), 3);
            assert!(!lock.try_acquire(&CnaNode::default(), 1));
            lock.release(&node, 3);
        }
        assert!(!lock.is_locked());
    }
}
