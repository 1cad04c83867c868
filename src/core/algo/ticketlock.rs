use crate::core::algo::RawLock;
use crate::core::spin::spin_until;
use std::sync::atomic::{AtomicU32, Ordering};

/// FIFO ticket spinlock. Context-free.
#[derive(Debug, Default)]
pub struct TicketLock {
    next: AtomicU32,
    owner: AtomicU32,
}

impl RawLock for TicketLock {
    type Node = ();
    const NAME: &'static str = "ticketlock";

    fn new() -> Self {
        TicketLock::default()
    }

    unsafe fn acquire(&self, _node: &()) {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        spin_until(|| self.owner.load(Ordering::Acquire) == ticket);
    }

    unsafe fn release(&self, _node: &()) {
        let owner = self.owner.load(Ordering::Relaxed);
        self.owner.store(owner.wrapping_add(1), Ordering::Release);
    }

    unsafe fn try_acquire(&self, _node: &()) -> bool {
        let owner = self.owner.load(Ordering::Acquire);
        self.next
            .compare_exchange(
                owner,
                owner.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}
