//! The rule-lifecycle state machine: the bridge between the in-memory
//! engine and the durable store that keeps the two-store consistency
//! invariant a theorem rather than a hope (§4.4, §8).
//!
//! Transitions for a given rule id are serialized by a per-id mutex stored
//! in a `DashMap`; different ids progress independently, avoiding the
//! global lock the design notes (§9) warn against.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::dsl;
use crate::engine::RuleEngine;
use crate::error::{EngineError, LifecycleError};
use crate::lamport_clock::LamportClock;
use crate::rule::{LifecycleState, Rule, Severity};
use crate::store::DurableStore;

pub struct Lifecycle {
    rules: DashMap<String, Arc<Mutex<Rule>>>,
    engine: Arc<RuleEngine>,
    store: Arc<dyn DurableStore>,
    max_rules: usize,
    /// Orders this lifecycle's own transitions; kept per-instance rather
    /// than sharing [`crate::lamport_clock::GLOBAL_CLOCK`] so independent
    /// engines (as in tests) don't observe each other's generations.
    clock: LamportClock,
}

impl Lifecycle {
    pub fn new(engine: Arc<RuleEngine>, store: Arc<dyn DurableStore>, max_rules: usize) -> Self {
        Self {
            rules: DashMap::new(),
            engine,
            store,
            max_rules,
            clock: LamportClock::new(),
        }
    }

    /// Load every rule currently in the durable store into the engine at
    /// startup (crash recovery, §8).
    pub fn recover(&self) -> Result<(), EngineError> {
        for id in self.store.list()? {
            let bytes = self.store.get(&id)?;
            let source = String::from_utf8_lossy(&bytes).to_string();
            let ast = dsl::compile(&source)?;
            let mut rule = Rule::new(id.clone(), id.clone(), source, Severity::Medium, "", 0);
            rule.ast = Some(ast);
            rule.state = LifecycleState::Persisted;
            self.engine.load_or_replace(rule.clone());
            self.rules.insert(id, Arc::new(Mutex::new(rule)));
        }
        Ok(())
    }

    pub fn create(
        &self,
        id: &str,
        name: &str,
        source: &str,
        severity: Severity,
        description: &str,
        now_millis: u64,
    ) -> Result<Rule, EngineError> {
        if self.rules.contains_key(id) {
            return Err(EngineError::DuplicateId(id.to_string()));
        }
        if self.rules.len() >= self.max_rules {
            return Err(EngineError::Capacity(self.max_rules));
        }

        let slot = Arc::new(Mutex::new(Rule::new(
            id,
            name,
            source,
            severity,
            description,
            now_millis,
        )));
        // Reserve the id before doing any fallible work so a concurrent
        // Create of the same id observes DuplicateId rather than racing.
        if self.rules.insert(id.to_string(), Arc::clone(&slot)).is_some() {
            return Err(EngineError::DuplicateId(id.to_string()));
        }

        let mut guard = slot.lock().unwrap();
        match self.admit(&mut guard) {
            Ok(()) => Ok(guard.clone()),
            Err(e) => {
                self.rules.remove(id);
                Err(e)
            }
        }
    }

    pub fn update(
        &self,
        id: &str,
        new_source: &str,
        now_millis: u64,
    ) -> Result<Rule, EngineError> {
        let slot = self
            .rules
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let mut guard = slot.lock().unwrap();
        let previous = guard.clone();
        guard.source = new_source.to_string();
        guard.ast = None;
        guard.state = LifecycleState::Draft;
        guard.updated_at_millis = now_millis;

        match self.admit(&mut guard) {
            Ok(()) => Ok(guard.clone()),
            Err(e) => {
                // Roll back to the previously persisted rule: the engine
                // and store must keep reflecting `previous`, not the
                // half-applied update.
                *guard = previous;
                Err(e)
            }
        }
    }

    /// Runs Draft -> Validating -> Compiled -> Live -> Persisted,
    /// compensating backwards on the first failure.
    fn admit(&self, rule: &mut Rule) -> Result<(), EngineError> {
        rule.generation = self.clock.tick();
        rule.state = LifecycleState::Validating;
        let ast = match dsl::compile(&rule.source) {
            Ok(ast) => ast,
            Err(e) => {
                rule.state = LifecycleState::Draft;
                return Err(EngineError::Parse(e));
            }
        };

        rule.state = LifecycleState::Compiled;
        rule.ast = Some(ast);

        rule.state = LifecycleState::Live;
        self.engine.load_or_replace(rule.clone());

        if let Err(e) = self.store.put(&rule.id, rule.source.as_bytes()) {
            // Compensate: remove the rule the engine just swapped in.
            self.engine.delete(&rule.id);
            rule.state = LifecycleState::Draft;
            return Err(EngineError::Store(e));
        }

        rule.state = LifecycleState::Persisted;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), EngineError> {
        let slot = self
            .rules
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let mut guard = slot.lock().unwrap();
        guard.state = LifecycleState::Retiring;

        self.engine.delete(id);
        self.store.delete(id)?;
        guard.state = LifecycleState::Deleted;
        drop(guard);
        self.rules.remove(id);
        Ok(())
    }

    /// Mark a rule quarantined: it stops being evaluated but remains
    /// visible to `list`/`get`. Called by the coordinator that watches
    /// per-rule error counts against `error_budget` (§4.2, §7).
    pub fn quarantine(&self, id: &str) -> Result<(), EngineError> {
        let slot = self
            .rules
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let mut guard = slot.lock().unwrap();
        guard.state = LifecycleState::Quarantined;
        self.engine.set_enabled(id, false);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Rule> {
        self.rules.get(id).map(|e| e.value().lock().unwrap().clone())
    }

    pub fn list(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .map(|e| e.value().lock().unwrap().clone())
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }

    pub fn validate_source(&self, source: &str) -> Result<(), EngineError> {
        dsl::compile(source)?;
        Ok(())
    }

    /// Quarantine every `Live`/`Persisted` rule whose error count has
    /// reached `error_budget` (§4.2, §7). Intended to be polled by the same
    /// maintenance loop that calls [`RuleEngine::sweep_idle_traces`]; returns
    /// the ids it quarantined so a caller can log them.
    pub fn enforce_error_budgets(&self) -> Vec<String> {
        let budget = self.engine.config().error_budget as u64;
        let mut quarantined = Vec::new();
        for entry in self.rules.iter() {
            let id = entry.key().clone();
            let already_quarantined = {
                let guard = entry.value().lock().unwrap();
                guard.state == LifecycleState::Quarantined
            };
            if already_quarantined {
                continue;
            }
            if self.engine.rule_stats(&id).errors >= budget {
                drop(entry);
                if self.quarantine(&id).is_ok() {
                    quarantined.push(id);
                }
            }
        }
        quarantined
    }
}

impl From<LifecycleError> for EngineError {
    fn from(e: LifecycleError) -> Self {
        EngineError::Lifecycle(e)
    }
}
