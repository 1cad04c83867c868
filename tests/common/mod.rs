use mutrep::Mutrep;
use mutrep::algo::{CasLock, RawLock};
use mutrep::topology::{CpuProbe, LevelSpec, Topology};
use std::borrow::Cow;
use std::cell::Cell;
use std::env;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Set in the environment of a child process re-running one test
#[allow(dead_code)]
pub const CHILD_ENV: &str = "MUTREP_TEST_CHILD";

#[allow(dead_code)]
pub const HANDOFF_TIMEOUT: Duration = Duration::from_secs(5);

/// Silence per-transition traces for the whole test binary
#[allow(dead_code)]
pub fn quiet() {
    Mutrep::new().quiet().start().expect("Failed to configure mutrep");
}

const TAGS: usize = 8;
static NEWS: [AtomicUsize; TAGS] = [const { AtomicUsize::new(0) }; TAGS];
static DESTROYS: [AtomicUsize; TAGS] = [const { AtomicUsize::new(0) }; TAGS];

/// A CAS spinlock counting constructions and teardowns. Each test uses its
/// own `TAG` so counters do not interfere across parallel tests.
#[allow(dead_code)]
pub struct CountingLock<const TAG: usize> {
    inner: CasLock,
}

impl<const TAG: usize> CountingLock<TAG> {
    #[allow(dead_code)]
    pub fn constructed() -> usize {
        NEWS[TAG].load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn destroyed() -> usize {
        DESTROYS[TAG].load(Ordering::SeqCst)
    }
}

impl<const TAG: usize> RawLock for CountingLock<TAG> {
    type Node = ();
    const NAME: &'static str = "countinglock";

    fn new() -> Self {
        NEWS[TAG].fetch_add(1, Ordering::SeqCst);
        // Widen the window in which other threads see INITIALIZING.
        thread::sleep(Duration::from_millis(5));
        CountingLock {
            inner: CasLock::new(),
        }
    }

    fn destroy(&mut self) {
        DESTROYS[TAG].fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
    }

    unsafe fn acquire(&self, _node: &()) {
        self.inner.lock();
    }

    unsafe fn release(&self, _node: &()) {
        self.inner.unlock();
    }

    unsafe fn try_acquire(&self, _node: &()) -> bool {
        self.inner.try_lock()
    }
}

thread_local! {
    static PINNED_CPU: Cell<usize> = const { Cell::new(0) };
}

/// CPU probe reporting the CPU the test pinned the thread to
#[allow(dead_code)]
pub struct FakeCpu;

impl FakeCpu {
    #[allow(dead_code)]
    pub fn pin(cpu: usize) {
        PINNED_CPU.with(|c| c.set(cpu));
    }
}

impl CpuProbe for FakeCpu {
    fn current_cpu() -> usize {
        PINNED_CPU.with(Cell::get)
    }
}

mutrep::declare_topology! {
    /// 8 cpus, 4 cores, 2 NUMA domains; leaves shared by sibling threads
    #[allow(dead_code)]
    pub SmallMachine = Topology {
        cpus: 8,
        cores: 4,
        numa_domains: 2,
        levels: Cow::Borrowed(&[
            LevelSpec { fanout: 1, threshold: 1 },
            LevelSpec { fanout: 2, threshold: 4 },
            LevelSpec { fanout: 2, threshold: 4 },
        ]),
        cpus_per_leaf: 2,
    }
}

/// Whether this process is the child spawned by [`run_child`]
#[allow(dead_code)]
pub fn is_child() -> bool {
    env::var_os(CHILD_ENV).is_some()
}

/// Re-run test `name` of the current test binary in a child process.
#[allow(dead_code)]
pub fn run_child(name: &str) -> Output {
    let exe = env::current_exe().expect("current test binary");
    Command::new(exe)
        .args([name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .output()
        .expect("Failed to spawn child test process")
}

/// Assert the child aborted and reported `message` on stderr
#[allow(dead_code)]
pub fn assert_aborted_with(output: &Output, message: &str) {
    assert!(
        !output.status.success(),
        "child exited successfully: {:?}",
        output.status
    );
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(output.status.signal(), Some(libc::SIGABRT));
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(message),
        "stderr does not mention {message:?}:\n{stderr}"
    );
}
