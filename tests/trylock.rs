use mutrep::LazyMutex;
use mutrep::algo::{CasLock, McsLock, TicketLock};
use mutrep::context::{
    HeapContext, KeyedContext, NoContext, arena_depth, live_heap_contexts,
};
use std::thread;
mod common;

#[test]
fn test_failed_trylock_claims_no_arena_slot() {
    let mutex = LazyMutex::<McsLock>::new();
    mutex.lock();
    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..100 {
                assert!(!mutex.trylock());
            }
            assert_eq!(arena_depth(), 0);
        });
    });
    unsafe { mutex.unlock() };
}

#[test]
fn test_failed_trylock_leaves_no_key_association() {
    let mutex = LazyMutex::<McsLock, KeyedContext>::new();
    mutex.lock();
    thread::scope(|s| {
        s.spawn(|| {
            assert!(!mutex.trylock());
            assert!(!mutex.store().has_context());
            assert_eq!(live_heap_contexts(), 0);
        });
    });
    unsafe { mutex.unlock() };
    assert!(!mutex.store().has_context());
}

#[test]
fn test_failed_trylock_leaves_no_heap_context() {
    common::quiet();
    let mutex = LazyMutex::<CasLock, HeapContext>::new();
    mutex.lock();
    let held = live_heap_contexts();
    thread::scope(|s| {
        s.spawn(|| {
            assert!(!mutex.trylock());
            assert_eq!(live_heap_contexts(), 0);
        });
    });
    // The holder's context is untouched by the failed attempt.
    assert!(mutex.store().has_context());
    assert_eq!(live_heap_contexts(), held);
    unsafe { mutex.unlock() };
    assert!(!mutex.store().has_context());
}

#[test]
fn test_successful_trylock_commits_context() {
    let mutex = LazyMutex::<McsLock>::new();
    assert!(mutex.trylock());
    assert_eq!(arena_depth(), 1);
    unsafe { mutex.unlock() };
    assert_eq!(arena_depth(), 0);

    let keyed = LazyMutex::<McsLock, KeyedContext>::new();
    assert!(keyed.trylock());
    assert!(keyed.store().has_context());
    unsafe { keyed.unlock() };
    assert!(!keyed.store().has_context());
}

#[test]
fn test_context_free_trylock() {
    let mutex = LazyMutex::<TicketLock, NoContext>::new();
    assert!(mutex.trylock());
    thread::scope(|s| {
        s.spawn(|| assert!(!mutex.trylock()));
    });
    unsafe { mutex.unlock() };
    assert!(mutex.trylock());
    unsafe { mutex.unlock() };
}
