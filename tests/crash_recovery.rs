//! A process restart must not lose or duplicate any persisted rule.

use std::sync::Arc;

use betrace::config::EngineConfig;
use betrace::engine::RuleEngine;
use betrace::lifecycle::Lifecycle;
use betrace::rule::Severity;
use betrace::store::{DurableStore, FileStore};
use tempfile::tempdir;

#[test]
fn restart_reloads_every_persisted_rule_exactly_once() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn DurableStore> = Arc::new(FileStore::new(dir.path()).unwrap());

    let engine1 = RuleEngine::new(EngineConfig::default());
    let lc1 = Lifecycle::new(Arc::clone(&engine1), Arc::clone(&store), 100);
    lc1.create(
        "no-fraud-bypass",
        "no-fraud-bypass",
        r#"when { payment } never { trace.count(fraud-check) == 0 }"#,
        Severity::Critical,
        "payments must be fraud-checked",
        0,
    )
    .unwrap();
    lc1.create(
        "slow-checkout",
        "slow-checkout",
        r#"when { checkout.where(span.duration > 1000000000) } always { span.status == "ERROR" }"#,
        Severity::Medium,
        "",
        0,
    )
    .unwrap();
    engine1.shutdown();

    // Simulate the process dying and a fresh one starting against the same
    // durable store.
    let engine2 = RuleEngine::new(EngineConfig::default());
    let lc2 = Lifecycle::new(Arc::clone(&engine2), store, 100);
    lc2.recover().unwrap();

    let mut ids: Vec<String> = lc2.list().into_iter().map(|r| r.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["no-fraud-bypass".to_string(), "slow-checkout".to_string()]);
    assert_eq!(engine2.snapshot().len(), 2);
    engine2.shutdown();
}
