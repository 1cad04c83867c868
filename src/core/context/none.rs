use crate::core::algo::RawLock;
use crate::core::context::{ContextHandle, ContextStore};
use crate::core::types::MutexId;
use std::ptr::NonNull;

/// Strategy for algorithms that take no node
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContext;

// SAFETY: `()` carries no state, every handle points at nothing.
unsafe impl<L: RawLock<Node = ()>> ContextStore<L> for NoContext {
    const INIT: Self = NoContext;
    const NAME: &'static str = "none";

    fn acquire_context(&self, _mutex: MutexId) -> ContextHandle<()> {
        ContextHandle::new(NonNull::dangling(), None)
    }

    fn commit_context(&self, _mutex: MutexId, _handle: &ContextHandle<()>) {}

    fn abandon_context(&self, _mutex: MutexId, _handle: ContextHandle<()>) {}

    fn current_context(&self, _mutex: MutexId) -> ContextHandle<()> {
        ContextHandle::new(NonNull::dangling(), None)
    }

    fn release_context(&self, _mutex: MutexId, _handle: ContextHandle<()>) {}
}
