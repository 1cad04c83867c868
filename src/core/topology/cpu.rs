/// Source of the CPU the calling thread runs on
pub trait CpuProbe: 'static {
    /// Physical id of the current CPU
    fn current_cpu() -> usize;
}

/// Asks the scheduler through `sched_getcpu`.
///
/// A failing query is fatal. Platforms without `sched_getcpu` report CPU 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedCpu;

impl CpuProbe for SchedCpu {
    #[cfg(target_os = "linux")]
    fn current_cpu() -> usize {
        use crate::core::error::{Violation, fatal};

        // SAFETY: sched_getcpu has no preconditions.
        let cpu = unsafe { libc::sched_getcpu() };
        if cpu < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            fatal(None, Violation::CpuQuery { errno });
        }
        cpu as usize
    }

    #[cfg(not(target_os = "linux"))]
    fn current_cpu() -> usize {
        0
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::CpuProbe;
    use std::cell::Cell;

    thread_local! {
        static CPU: Cell<usize> = const { Cell::new(0) };
    }

    /// Probe reporting whatever the test last pinned the thread to
    pub(crate) struct FakeCpu;

    impl FakeCpu {
        pub(crate) fn pin(cpu: usize) {
            CPU.with(|c| c.set(cpu));
        }
    }

    impl CpuProbe for FakeCpu {
        fn current_cpu() -> usize {
            CPU.with(Cell::get)
        }
    }
}
