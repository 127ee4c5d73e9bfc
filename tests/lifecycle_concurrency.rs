//! Concurrent mutations against the same rule id must serialize rather than
//! corrupt engine/store state; mutations against different ids must not
//! block each other.

use std::sync::Arc;
use std::thread;

use betrace::config::EngineConfig;
use betrace::engine::RuleEngine;
use betrace::lifecycle::Lifecycle;
use betrace::rule::Severity;
use betrace::store::{DurableStore, FileStore};
use tempfile::tempdir;

fn harness() -> (Arc<Lifecycle>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store: Arc<dyn DurableStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let engine = RuleEngine::new(EngineConfig::default());
    (Arc::new(Lifecycle::new(engine, store, 100)), dir)
}

#[test]
fn concurrent_updates_to_the_same_rule_leave_it_in_a_single_consistent_state() {
    let (lc, _dir) = harness();
    lc.create("r1", "r1", "when { x } always { y }", Severity::Low, "", 0)
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let lc = Arc::clone(&lc);
            thread::spawn(move || {
                let _ = lc.update("r1", &format!("when {{ v{i} }} always {{ w{i} }}"), i as u64);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let rule = lc.get("r1").unwrap();
    assert!(rule.source.starts_with("when { v"));
    // Exactly one rule under this id, whichever writer won the race.
    assert_eq!(lc.list().len(), 1);
}

#[test]
fn independent_rule_ids_progress_without_contending() {
    let (lc, _dir) = harness();
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let lc = Arc::clone(&lc);
            thread::spawn(move || {
                lc.create(
                    &format!("r{i}"),
                    &format!("r{i}"),
                    "when { x } always { y }",
                    Severity::Low,
                    "",
                    0,
                )
                .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(lc.list().len(), 16);
}
