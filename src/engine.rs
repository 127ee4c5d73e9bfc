//! The concurrent rule engine: worker pool, ingestion queue, backpressure.
//!
//! The active rule table is a copy-on-write snapshot behind a `RwLock`:
//! readers (evaluation workers) clone the cheap `Arc` pointer and evaluate
//! against it undisturbed by concurrent writers; writers build a new map
//! and swap the pointer. This gives the atomicity contract in §4.3 without
//! a global lock on every span.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};

use crate::config::EngineConfig;
use crate::evaluator::{self, Decision};
use crate::rule::Rule;
use crate::span::Span;
use crate::stats::{RuleStats, StatsTracker};
use crate::trace_accumulator::TraceAccumulator;
use crate::violation::ViolationRecord;

type RuleTable = Arc<HashMap<String, Rule>>;

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub submitted: u64,
    pub dropped: u64,
    pub evicted_traces: u64,
}

/// Owns the active compiled rule set and drives span evaluation.
pub struct RuleEngine {
    table: RwLock<RuleTable>,
    sender: Sender<Span>,
    receiver: Receiver<Span>,
    trace_accumulator: Mutex<TraceAccumulator>,
    stats: Mutex<StatsTracker>,
    violations_tx: Sender<ViolationRecord>,
    violations_rx: Receiver<ViolationRecord>,
    config: EngineConfig,
    submitted: AtomicU64,
    dropped: AtomicU64,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl RuleEngine {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        let (sender, receiver) = channel::bounded(config.ingest_queue);
        let (violations_tx, violations_rx) = channel::unbounded();
        let accumulator = TraceAccumulator::new(
            config.trace_max_spans,
            config.trace_window(),
            config.max_rules.max(1) * 10,
        );

        let engine = Arc::new(Self {
            table: RwLock::new(Arc::new(HashMap::new())),
            sender,
            receiver,
            trace_accumulator: Mutex::new(accumulator),
            stats: Mutex::new(StatsTracker::new()),
            violations_tx,
            violations_rx,
            config,
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            workers: Mutex::new(Vec::new()),
            shutdown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        });
        engine.spawn_workers();
        engine
    }

    fn spawn_workers(self: &Arc<Self>) {
        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let mut workers = self.workers.lock().unwrap();
        for _ in 0..worker_count {
            let engine = Arc::clone(self);
            workers.push(std::thread::spawn(move || engine.worker_loop()));
        }
    }

    fn worker_loop(&self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(span) => self.process_span(span),
                Err(channel::RecvTimeoutError::Timeout) => continue,
                Err(channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn process_span(&self, span: Span) {
        let snapshot = self.table.read().unwrap().clone();
        let mut closed_spans: Option<(Vec<Span>, bool)> = None;
        let mut trace_scoped_present = false;

        for rule in snapshot.values() {
            if !rule.enabled {
                continue;
            }
            let Some(ast) = &rule.ast else { continue };
            if ast.is_span_scoped() {
                let start = Instant::now();
                let decision = evaluator::evaluate(ast, &span, None);
                self.record_decision(rule, decision, &span, false);
                if start.elapsed() > self.config.eval_timeout() {
                    self.stats.lock().unwrap().record_error(&rule.id);
                }
            } else {
                trace_scoped_present = true;
            }
        }

        if trace_scoped_present {
            let mut acc = self.trace_accumulator.lock().unwrap();
            if let Some(ctx) = acc.push(span) {
                closed_spans = Some((ctx.spans().to_vec(), ctx.evicted));
            }
        }

        if let Some((spans, evicted)) = closed_spans {
            self.evaluate_closed_trace(&snapshot, &spans, evicted);
        }
    }

    fn evaluate_closed_trace(&self, snapshot: &RuleTable, spans: &[Span], evicted: bool) {
        use crate::trace_accumulator::TraceContext;
        let mut ctx = TraceContext::new();
        for s in spans {
            ctx.push(s.clone());
        }
        for rule in snapshot.values() {
            if !rule.enabled {
                continue;
            }
            let Some(ast) = &rule.ast else { continue };
            if ast.is_span_scoped() {
                continue;
            }
            for span in spans {
                let decision = evaluator::evaluate(ast, span, Some(&ctx));
                self.record_decision(rule, decision, span, evicted);
            }
        }
    }

    /// Flush any trace contexts that have gone idle past the configured
    /// window. Intended to be called periodically by a maintenance loop.
    pub fn sweep_idle_traces(&self) {
        let snapshot = self.table.read().unwrap().clone();
        let expired = self.trace_accumulator.lock().unwrap().sweep_idle();
        for (_, ctx) in expired {
            let spans = ctx.spans().to_vec();
            self.evaluate_closed_trace(&snapshot, &spans, ctx.evicted);
        }
    }

    fn record_decision(&self, rule: &Rule, decision: Decision, span: &Span, evicted: bool) {
        match decision {
            Decision::Match(failures) => {
                self.stats.lock().unwrap().record_evaluation(&rule.id, true);
                for failure in failures {
                    let mut metadata = std::collections::BTreeMap::new();
                    metadata.insert("clause_kind".to_string(), failure.kind.to_string());
                    metadata.insert(
                        "clause_index".to_string(),
                        failure.clause_index.to_string(),
                    );
                    metadata.insert("description".to_string(), failure.description);
                    let mut violation = ViolationRecord::new(
                        rule.id.clone(),
                        rule.name.clone(),
                        rule.severity,
                        span.trace_id_hex(),
                        span.span_id_hex(),
                        span.end_time_nanos,
                        metadata,
                        evicted,
                    );
                    if let Some(secret) = &self.config.signing_secret {
                        violation.sign(secret.as_bytes());
                    }
                    let _ = self.violations_tx.send(violation);
                }
            }
            Decision::NoMatch => {
                self.stats.lock().unwrap().record_evaluation(&rule.id, false);
            }
            Decision::Error(_) => {
                self.stats.lock().unwrap().record_error(&rule.id);
            }
        }
    }

    /// Enqueue one span. Blocks up to `ingest_block_ms` under backpressure,
    /// then drops it and counts the loss (§4.3, §5).
    pub fn submit(&self, span: Span) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        match self.sender.send_timeout(span, self.config.ingest_block()) {
            Ok(()) => {}
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Atomically replace (or insert) a compiled rule. Appears atomic to
    /// `submit`: in-flight evaluations keep using the snapshot they began
    /// with.
    pub fn load_or_replace(&self, rule: Rule) {
        let mut table = self.table.write().unwrap();
        let mut new_map = (**table).clone();
        new_map.insert(rule.id.clone(), rule);
        *table = Arc::new(new_map);
    }

    pub fn delete(&self, id: &str) {
        let mut table = self.table.write().unwrap();
        let mut new_map = (**table).clone();
        new_map.remove(id);
        *table = Arc::new(new_map);
        self.stats.lock().unwrap().remove(id);
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) {
        let mut table = self.table.write().unwrap();
        let mut new_map = (**table).clone();
        if let Some(rule) = new_map.get_mut(id) {
            rule.enabled = enabled;
        }
        *table = Arc::new(new_map);
    }

    pub fn snapshot(&self) -> Vec<Rule> {
        let table = self.table.read().unwrap().clone();
        let mut rules: Vec<Rule> = table.values().cloned().collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }

    pub fn rule_stats(&self, id: &str) -> RuleStats {
        self.stats.lock().unwrap().get(id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ingest_stats(&self) -> IngestStats {
        IngestStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            evicted_traces: self.trace_accumulator.lock().unwrap().evicted_count(),
        }
    }

    pub fn violations(&self) -> &Receiver<ViolationRecord> {
        &self.violations_rx
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let mut workers = self.workers.lock().unwrap();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl;
    use crate::rule::Severity;
    use crate::span::{SpanKind, StatusCode};

    fn test_span(name: &str) -> Span {
        Span::new(
            [1; 16],
            [2; 8],
            None,
            name,
            "svc",
            SpanKind::Server,
            StatusCode::Ok,
            0,
            2_000_000_000,
        )
    }

    fn compiled_rule(id: &str, source: &str) -> Rule {
        let ast = dsl::compile(source).unwrap();
        let mut rule = Rule::new(id, id, source, Severity::High, "", 0);
        rule.ast = Some(ast);
        rule.enabled = true;
        rule
    }

    #[test]
    fn span_scoped_rule_emits_violation_on_submit() {
        let engine = RuleEngine::new(EngineConfig::default());
        let rule = compiled_rule(
            "r1",
            r#"when { http.where(span.duration > 1000000000) } always { span.status == "ERROR" }"#,
        );
        engine.load_or_replace(rule);
        engine.submit(test_span("http"));

        let violation = engine
            .violations()
            .recv_timeout(Duration::from_secs(2))
            .expect("expected a violation");
        assert_eq!(violation.rule_id, "r1");
        engine.shutdown();
    }

    #[test]
    fn disabled_rule_is_not_evaluated() {
        let engine = RuleEngine::new(EngineConfig::default());
        let rule = compiled_rule(
            "r1",
            r#"when { http.where(span.duration > 1000000000) } always { span.status == "ERROR" }"#,
        );
        engine.load_or_replace(rule);
        engine.set_enabled("r1", false);
        engine.submit(test_span("http"));

        let result = engine.violations().recv_timeout(Duration::from_millis(300));
        assert!(result.is_err());
        engine.shutdown();
    }

    #[test]
    fn delete_removes_rule_from_snapshot() {
        let engine = RuleEngine::new(EngineConfig::default());
        engine.load_or_replace(compiled_rule("r1", "when { x } always { y }"));
        assert_eq!(engine.snapshot().len(), 1);
        engine.delete("r1");
        assert_eq!(engine.snapshot().len(), 0);
        engine.shutdown();
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let engine = RuleEngine::new(EngineConfig::default());
        engine.load_or_replace(compiled_rule("b", "when { x } always { y }"));
        engine.load_or_replace(compiled_rule("a", "when { x } always { y }"));
        let ids: Vec<String> = engine.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        engine.shutdown();
    }
}
