use mutrep::algo::{CasLock, McsLock};
use mutrep::context::{HeapContext, KeyedContext};
use mutrep::{CasMutex, CnaMutex, FastSlowMutex, HmcsMutex, LazyMutex, McsMutex, TicketMutex};
use rand::Rng;
use std::hint;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
mod common;

const THREADS: usize = 6;
const ROUNDS: usize = 400;

/// Run `THREADS` threads doing `ROUNDS` critical sections each through
/// `lock`/`unlock`, checking that nobody else is ever inside.
fn hammer<M: Send + Sync + 'static>(
    mutex: Arc<M>,
    lock: fn(&M),
    unlock: fn(&M),
) -> usize {
    let inside = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let mutex = Arc::clone(&mutex);
            let inside = Arc::clone(&inside);
            let total = Arc::clone(&total);
            thread::spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..ROUNDS {
                    lock(&mutex);
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    for _ in 0..rng.random_range(0..64) {
                        hint::spin_loop();
                    }
                    total.fetch_add(1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    unlock(&mutex);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    total.load(Ordering::Relaxed)
}

macro_rules! guarded_test {
    ($name:ident, $mutex:ident) => {
        #[test]
        fn $name() {
            let counter = Arc::new($mutex::new(0usize));
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let counter = Arc::clone(&counter);
                    thread::spawn(move || {
                        for _ in 0..ROUNDS {
                            let mut guard = counter.lock();
                            let seen = *guard;
                            hint::spin_loop();
                            *guard = seen + 1;
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(*counter.lock(), THREADS * ROUNDS);
        }
    };
}

guarded_test!(test_mcs_mutex_excludes, McsMutex);
guarded_test!(test_cas_mutex_excludes, CasMutex);
guarded_test!(test_ticket_mutex_excludes, TicketMutex);
guarded_test!(test_fastslow_mutex_excludes, FastSlowMutex);
guarded_test!(test_hmcs_mutex_excludes, HmcsMutex);
guarded_test!(test_cna_mutex_excludes, CnaMutex);

#[test]
fn test_keyed_contexts_exclude() {
    let total = hammer(
        Arc::new(LazyMutex::<McsLock, KeyedContext>::new()),
        |m| m.lock(),
        |m| unsafe { m.unlock() },
    );
    assert_eq!(total, THREADS * ROUNDS);
}

#[test]
fn test_heap_context_excludes() {
    common::quiet();
    let total = hammer(
        Arc::new(LazyMutex::<CasLock, HeapContext>::new()),
        |m| m.lock(),
        |m| unsafe { m.unlock() },
    );
    assert_eq!(total, THREADS * ROUNDS);
}

#[test]
fn test_trylock_spinning_excludes() {
    let total = hammer(
        Arc::new(LazyMutex::<McsLock>::new()),
        |m| {
            while !m.trylock() {
                hint::spin_loop();
            }
        },
        |m| unsafe { m.unlock() },
    );
    assert_eq!(total, THREADS * ROUNDS);
}
