//! Threshold-based cohort tree: the escalation policy behind the
//! hierarchical lock.
//!
//! Nodes are stored flat, root first. A thread locks its leaf, then climbs
//! towards the root until it reaches a node whose ancestors it already owns.
//! On release a node hands its ancestors over to a local waiter as long as
//! fewer than `threshold` consecutive local hand-offs happened; otherwise it
//! releases upwards first so other cohorts get a turn.

use crate::core::algo::CasLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One lock of the tree
#[derive(Debug)]
pub struct CohortNode {
    lock: CasLock,
    waiting: AtomicU32,
    passes: AtomicU32,
    // Written only by the holder of `lock`.
    owns_parent: AtomicBool,
    parent: Option<usize>,
    level: usize,
    threshold: u32,
}

impl CohortNode {
    /// Create an unlocked node at `level` (0 = root)
    pub fn new(level: usize, parent: Option<usize>, threshold: u32) -> Self {
        CohortNode {
            lock: CasLock::new(),
            waiting: AtomicU32::new(0),
            passes: AtomicU32::new(0),
            owns_parent: AtomicBool::new(false),
            parent,
            level,
            threshold: threshold.max(1),
        }
    }

    /// Index of the parent node, `None` for the root
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Depth of the node, the root being level 0
    pub fn level(&self) -> usize {
        self.level
    }

    /// Consecutive local hand-offs allowed before escalating
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Whether a thread currently holds this node
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

/// Acquire the tree starting from `leaf`.
pub fn acquire_from(nodes: &[CohortNode], leaf: usize) {
    let node = &nodes[leaf];
    node.waiting.fetch_add(1, Ordering::Relaxed);
    node.lock.lock();
    node.waiting.fetch_sub(1, Ordering::Relaxed);

    if node.owns_parent.load(Ordering::Relaxed) {
        // A local predecessor passed its ancestors along.
        return;
    }
    if let Some(parent) = node.parent {
        acquire_from(nodes, parent);
        node.owns_parent.store(true, Ordering::Relaxed);
    }
}

/// Release the tree starting from `leaf`, which the caller must hold.
pub fn release_from(nodes: &[CohortNode], leaf: usize) {
    let node = &nodes[leaf];
    if let Some(parent) = node.parent {
        let passes = node.passes.load(Ordering::Relaxed);
        if node.waiting.load(Ordering::Relaxed) > 0 && passes + 1 < node.threshold {
            node.passes.store(passes + 1, Ordering::Relaxed);
            node.lock.unlock();
            return;
        }
        node.passes.store(0, Ordering::Relaxed);
        node.owns_parent.store(false, Ordering::Relaxed);
        release_from(nodes, parent);
    }
    node.lock.unlock();
}
