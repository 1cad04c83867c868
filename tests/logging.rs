use mutrep::algo::CasLock;
use mutrep::context::HeapContext;
use mutrep::{LazyMutex, Mutrep};
use serde_json::Value;
use std::fs;
use std::thread;

// Single test: the logger is process-global.
#[test]
fn test_heap_transitions_are_logged_as_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    Mutrep::new().with_log(&path).start().unwrap();

    let mutex = LazyMutex::<CasLock, HeapContext>::new();
    mutex.lock();
    unsafe { mutex.unlock() };
    assert!(mutex.trylock());
    thread::scope(|s| {
        s.spawn(|| assert!(!mutex.trylock()));
    });
    unsafe { mutex.unlock() };
    unsafe { mutex.destroy() };
    let id = mutex.id();

    Mutrep::new().quiet().start().unwrap();
    // Silenced: nothing more reaches the file.
    mutex.lock();
    unsafe { mutex.unlock() };

    let entries: Vec<Value> = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let events: Vec<&str> = entries
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(
        events,
        [
            "init",
            "lock",
            "unlock",
            "try_lock_acquired",
            "try_lock_failed",
            "unlock",
            "destroy"
        ]
    );
    assert!(entries.iter().all(|e| e["mutex"] == id.0));
    assert!(entries.iter().all(|e| e["timestamp"].as_f64().unwrap() > 0.0));

    // lock and unlock report the same context
    assert_eq!(entries[1]["context"], entries[2]["context"]);
    assert!(entries[1]["context"].is_u64());
    assert!(entries[0]["context"].is_null());
}
