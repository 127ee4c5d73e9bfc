//! Trace accumulator: buffers spans sharing a trace id for trace-scoped
//! predicates (`trace.has`, `trace.count`, `trace.all`, `count(...)`).
//!
//! A trace context is represented as an ordered sequence plus a map from
//! span id to position, both owned by the context, rather than as a
//! persistent graph; parent/child relationships are walked on demand by
//! the evaluator, never materialized (§9).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::span::Span;

/// An ordered, bounded buffer of spans sharing one trace id.
#[derive(Debug, Default)]
pub struct TraceContext {
    spans: Vec<Span>,
    position: HashMap<[u8; 8], usize>,
    last_activity: Option<Instant>,
    /// Set once this context has already been flushed and a span arrives
    /// for the same trace id afterwards (§4.5 late-arrival marker).
    pub evicted: bool,
}

impl TraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, span: Span) {
        self.position.insert(span.span_id, self.spans.len());
        self.spans.push(span);
        self.last_activity = Some(Instant::now());
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn position_of(&self, span_id: &[u8; 8]) -> Option<usize> {
        self.position.get(span_id).copied()
    }

    pub fn idle_for(&self) -> Option<Duration> {
        self.last_activity.map(|t| t.elapsed())
    }
}

/// Sharded, bounded buffer of [`TraceContext`]s keyed by trace id, with
/// size-based and idle-timer-based closing plus a global LRU eviction cap.
pub struct TraceAccumulator {
    contexts: HashMap<[u8; 16], TraceContext>,
    lru: Vec<[u8; 16]>,
    max_spans_per_trace: usize,
    idle_timeout: Duration,
    max_traces: usize,
    evicted_count: u64,
    /// Trace ids forced out by [`Self::evict_oldest`], remembered so a span
    /// that later arrives for the same id can be tagged `evicted` (§4.5)
    /// instead of silently starting a fresh context. Bounded by `evicted_order`
    /// so this can't grow without bound under a churning trace id space.
    evicted_ids: HashSet<[u8; 16]>,
    evicted_order: VecDeque<[u8; 16]>,
}

impl TraceAccumulator {
    pub fn new(max_spans_per_trace: usize, idle_timeout: Duration, max_traces: usize) -> Self {
        Self {
            contexts: HashMap::new(),
            lru: Vec::new(),
            max_spans_per_trace,
            idle_timeout,
            max_traces,
            evicted_count: 0,
            evicted_ids: HashSet::new(),
            evicted_order: VecDeque::new(),
        }
    }

    /// Returns `Some(ready_context)` if this push closed the trace (size
    /// cap reached). Callers should also call [`Self::sweep_idle`]
    /// periodically to flush traces that have gone quiet.
    pub fn push(&mut self, span: Span) -> Option<TraceContext> {
        let trace_id = span.trace_id;
        let already_evicted = !self.contexts.contains_key(&trace_id) && self.was_evicted(&trace_id);

        if !self.contexts.contains_key(&trace_id) {
            if self.contexts.len() >= self.max_traces {
                self.evict_oldest();
            }
            self.lru.push(trace_id);
            self.contexts.insert(trace_id, TraceContext::new());
        }

        let ctx = self.contexts.get_mut(&trace_id).expect("just inserted");
        if already_evicted {
            ctx.evicted = true;
        }
        ctx.push(span);

        if ctx.len() >= self.max_spans_per_trace {
            self.contexts.remove(&trace_id)
        } else {
            None
        }
    }

    /// Remove and return every trace context that has been idle for at
    /// least the configured window.
    pub fn sweep_idle(&mut self) -> Vec<([u8; 16], TraceContext)> {
        let expired: Vec<[u8; 16]> = self
            .contexts
            .iter()
            .filter(|(_, ctx)| ctx.idle_for().map(|d| d >= self.idle_timeout).unwrap_or(false))
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.contexts.remove(&id).map(|ctx| (id, ctx)))
            .collect()
    }

    pub fn active_trace_count(&self) -> usize {
        self.contexts.len()
    }

    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    fn was_evicted(&self, trace_id: &[u8; 16]) -> bool {
        self.evicted_ids.contains(trace_id)
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.lru.first().copied() {
            self.lru.remove(0);
            self.contexts.remove(&oldest);
            self.evicted_count += 1;
            self.remember_evicted(oldest);
        }
    }

    fn remember_evicted(&mut self, trace_id: [u8; 16]) {
        self.evicted_ids.insert(trace_id);
        self.evicted_order.push_back(trace_id);
        if self.evicted_order.len() > self.max_traces.max(1) {
            if let Some(oldest) = self.evicted_order.pop_front() {
                self.evicted_ids.remove(&oldest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{SpanKind, StatusCode};

    fn span(trace_id: [u8; 16], span_id: u8) -> Span {
        Span::new(
            trace_id,
            [span_id; 8],
            None,
            "op",
            "svc",
            SpanKind::Internal,
            StatusCode::Ok,
            0,
            1,
        )
    }

    #[test]
    fn push_orders_spans_by_arrival() {
        let mut ctx = TraceContext::new();
        ctx.push(span([1; 16], 1));
        ctx.push(span([1; 16], 2));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.position_of(&[2u8; 8]), Some(1));
    }

    #[test]
    fn accumulator_closes_trace_at_size_cap() {
        let mut acc = TraceAccumulator::new(2, Duration::from_secs(30), 100);
        assert!(acc.push(span([1; 16], 1)).is_none());
        let closed = acc.push(span([1; 16], 2));
        assert!(closed.is_some());
        assert_eq!(closed.unwrap().len(), 2);
    }

    #[test]
    fn accumulator_evicts_lru_beyond_max_traces() {
        let mut acc = TraceAccumulator::new(100, Duration::from_secs(30), 1);
        acc.push(span([1; 16], 1));
        acc.push(span([2; 16], 1));
        assert_eq!(acc.active_trace_count(), 1);
        assert_eq!(acc.evicted_count(), 1);
    }

    #[test]
    fn late_span_for_an_evicted_trace_id_is_tagged_evicted() {
        let mut acc = TraceAccumulator::new(2, Duration::from_secs(30), 2);
        acc.push(span([1; 16], 1));
        acc.push(span([2; 16], 1));
        // Third distinct trace id forces [1;16] out under the max_traces cap.
        acc.push(span([3; 16], 1));
        assert_eq!(acc.evicted_count(), 1);

        // [1;16] arrives again: it re-enters as a fresh context tagged
        // `evicted`, which survives until the context next closes.
        assert!(acc.push(span([1; 16], 2)).is_none());
        let closed = acc.push(span([1; 16], 3)).unwrap();
        assert!(closed.evicted);
        assert_eq!(closed.len(), 2);
    }
}
