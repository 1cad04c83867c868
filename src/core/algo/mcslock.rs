//! MCS (Mellor-Crummey Scott) queue lock.
//!
//! Waiters form a linked queue of nodes and each spins on its own node, so
//! the hand-off is FIFO and cache-local. The node must live at a fixed
//! address from acquire until release; that is what the context stores
//! provide.

use crate::core::algo::RawLock;
use crate::core::spin::spin_until;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

/// Queue node of an MCS lock
#[derive(Debug)]
pub struct McsNode {
    next: AtomicPtr<McsNode>,
    waiting: AtomicBool,
}

impl Default for McsNode {
    fn default() -> Self {
        McsNode {
            next: AtomicPtr::new(ptr::null_mut()),
            waiting: AtomicBool::new(false),
        }
    }
}

impl McsNode {
    fn as_ptr(&self) -> *mut McsNode {
        self as *const McsNode as *mut McsNode
    }
}

/// MCS queue lock
#[derive(Debug)]
pub struct McsLock {
    tail: AtomicPtr<McsNode>,
}

impl Default for McsLock {
    fn default() -> Self {
        McsLock {
            tail: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl McsLock {
    /// Whether the queue is non-empty
    pub fn is_locked(&self) -> bool {
        !self.tail.load(Ordering::Relaxed).is_null()
    }
}

impl RawLock for McsLock {
    type Node = McsNode;
    const NAME: &'static str = "mcslock";

    fn new() -> Self {
        McsLock::default()
    }

    unsafe fn acquire(&self, node: &McsNode) {
        node.next.store(ptr::null_mut(), Ordering::Relaxed);
        node.waiting.store(true, Ordering::Relaxed);

        let pred = self.tail.swap(node.as_ptr(), Ordering::AcqRel);
        if pred.is_null() {
            return;
        }
        // SAFETY: a predecessor stays alive until it has handed the lock to us.
        unsafe { &*pred }.next.store(node.as_ptr(), Ordering::Release);

        spin_until(|| !node.waiting.load(Ordering::Acquire));
    }

    unsafe fn release(&self, node: &McsNode) {
        let mut next = node.next.load(Ordering::Acquire);
        if next.is_null() {
            if self
                .tail
                .compare_exchange(
                    node.as_ptr(),
                    ptr::null_mut(),
                    Ordering::Release,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return;
            }
            // A successor swapped itself in but has not linked yet.
            spin_until(|| {
                next = node.next.load(Ordering::Acquire);
                !next.is_null()
            });
        }
        // SAFETY: the successor spins on its node until this store.
        unsafe { &*next }.waiting.store(false, Ordering::Release);
    }

    unsafe fn try_acquire(&self, node: &McsNode) -> bool {
        node.next.store(ptr::null_mut(), Ordering::Relaxed);
        node.waiting.store(false, Ordering::Relaxed);
        self.tail
            .compare_exchange(
                ptr::null_mut(),
                node.as_ptr(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_try_acquire_does_not_queue_on_failure() {
        let lock = McsLock::default();
        let held = McsNode::default();
        let other = McsNode::default();
        unsafe {
            lock.acquire(&held);
            assert!(!lock.try_acquire(&other));
            assert!(other.next.load(Ordering::Relaxed).is_null());
            lock.release(&held);
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_concurrent_counter() {
        let lock = Arc::new(McsLock::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let node = McsNode::default();
                        unsafe {
                            lock.acquire(&node);
                            let v = counter.load(Ordering::Relaxed);
                            counter.store(v + 1, Ordering::Relaxed);
                            lock.release(&node);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 4000);
    }
}
