use std::hint;
use std::thread;

/// Exponential spin backoff that falls back to yielding the time slice.
///
/// Used by every busy-wait in the crate: the lazy-init wait loop and the
/// reference lock algorithms. Waiting never blocks on another lock.
#[derive(Debug, Default)]
pub struct SpinWait {
    step: u32,
}

impl SpinWait {
    /// Doublings of the spin count before switching to `yield_now`
    const SPIN_LIMIT: u32 = 6;

    /// Create a fresh backoff
    pub const fn new() -> Self {
        SpinWait { step: 0 }
    }

    /// Wait a little longer than last time
    #[inline]
    pub fn spin(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                hint::spin_loop();
            }
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }
}

/// Spin until `done` returns true.
#[inline]
pub fn spin_until(mut done: impl FnMut() -> bool) {
    let mut wait = SpinWait::new();
    while !done() {
        wait.spin();
    }
}
