//! Violation export (§6): fire-and-forget, batched delivery out of the
//! engine. Retries are the exporter's problem, not the engine's.

use crossbeam::channel::{Receiver, Sender};

use crate::violation::ViolationRecord;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

pub trait ViolationExporter: Send + Sync {
    fn export_batch(&self, batch: &[ViolationRecord]);
}

/// Discards everything. Useful as a default when no exporter is wired up.
pub struct NullExporter;

impl ViolationExporter for NullExporter {
    fn export_batch(&self, _batch: &[ViolationRecord]) {}
}

/// Forwards batches onto a channel; the test harness drains the other end.
pub struct ChannelExporter {
    sender: Sender<Vec<ViolationRecord>>,
}

impl ChannelExporter {
    pub fn new() -> (Self, Receiver<Vec<ViolationRecord>>) {
        let (sender, receiver) = crossbeam::channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl ViolationExporter for ChannelExporter {
    fn export_batch(&self, batch: &[ViolationRecord]) {
        let _ = self.sender.send(batch.to_vec());
    }
}

/// Drains an engine's violation channel, batching by size or delay, and
/// forwards batches to an exporter. Runs on its own thread.
pub fn run_batcher(
    violations: Receiver<ViolationRecord>,
    exporter: std::sync::Arc<dyn ViolationExporter>,
    batch_size: usize,
    batch_delay: std::time::Duration,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut batch = Vec::with_capacity(batch_size);
        loop {
            match violations.recv_timeout(batch_delay) {
                Ok(v) => {
                    batch.push(v);
                    if batch.len() >= batch_size {
                        exporter.export_batch(&batch);
                        batch.clear();
                    }
                }
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                    if !batch.is_empty() {
                        exporter.export_batch(&batch);
                        batch.clear();
                    }
                }
                Err(crossbeam::channel::RecvTimeoutError::Disconnected) => {
                    if !batch.is_empty() {
                        exporter.export_batch(&batch);
                    }
                    break;
                }
            }
        }
    })
}

#[cfg(feature = "otlp")]
pub mod otlp {
    //! OTLP shaping of violation batches into the fixed attribute schema of
    //! §6 (`betrace.violation.id`, `.rule_id`, ...). Gated the same way the
    //! corpus gates its own OTLP exporter behind the `otlp` feature.

    use super::{ViolationExporter, ViolationRecord};

    #[derive(Debug, Clone)]
    pub struct OtlpConfig {
        pub endpoint: String,
        pub service_name: String,
        pub batch_size: usize,
        pub batch_delay_ms: u64,
    }

    impl OtlpConfig {
        pub fn new(endpoint: impl Into<String>, service_name: impl Into<String>) -> Self {
            Self {
                endpoint: endpoint.into(),
                service_name: service_name.into(),
                batch_size: super::DEFAULT_BATCH_SIZE,
                batch_delay_ms: super::DEFAULT_BATCH_DELAY.as_millis() as u64,
            }
        }

        pub fn with_batch_size(mut self, size: usize) -> Self {
            self.batch_size = size;
            self
        }

        pub fn with_batch_delay_ms(mut self, ms: u64) -> Self {
            self.batch_delay_ms = ms;
            self
        }
    }

    /// Shapes a violation into the OTLP span-attribute schema (§6). The
    /// actual network export is left to the host application's configured
    /// `opentelemetry-otlp` pipeline; this function only performs the
    /// attribute mapping so it stays unit-testable without a collector.
    pub fn to_otlp_attributes(v: &ViolationRecord) -> Vec<(&'static str, String)> {
        vec![
            ("betrace.violation.id", v.id.clone()),
            ("betrace.rule_id", v.rule_id.clone()),
            ("betrace.rule_name", v.rule_name.clone()),
            ("betrace.severity", format!("{:?}", v.severity).to_uppercase()),
            (
                "betrace.message",
                v.metadata.get("description").cloned().unwrap_or_default(),
            ),
            (
                "betrace.signature",
                v.signature.clone().unwrap_or_default(),
            ),
        ]
    }

    /// A no-op exporter placeholder kept here as the extension point a real
    /// `opentelemetry-otlp` pipeline would plug into; wiring an actual
    /// tracer provider is host-application configuration, not engine logic.
    pub struct OtlpExporter {
        config: OtlpConfig,
    }

    impl OtlpExporter {
        pub fn new(config: OtlpConfig) -> Self {
            Self { config }
        }

        pub fn config(&self) -> &OtlpConfig {
            &self.config
        }
    }

    impl ViolationExporter for OtlpExporter {
        fn export_batch(&self, batch: &[ViolationRecord]) {
            for v in batch {
                let attrs = to_otlp_attributes(v);
                tracing::info!(endpoint = %self.config.endpoint, ?attrs, "exporting violation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Severity;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn sample_violation(id: &str) -> ViolationRecord {
        ViolationRecord::new(id, "name", Severity::Low, "trace", "span", 0, BTreeMap::new(), false)
    }

    #[test]
    fn batcher_flushes_on_size() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let (exporter, batches) = ChannelExporter::new();
        let handle = run_batcher(rx, Arc::new(exporter), 2, Duration::from_millis(50));

        tx.send(sample_violation("a")).unwrap();
        tx.send(sample_violation("b")).unwrap();

        let batch = batches.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(batch.len(), 2);
        drop(tx);
        let _ = handle.join();
    }

    #[test]
    fn batcher_flushes_on_delay() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let (exporter, batches) = ChannelExporter::new();
        let handle = run_batcher(rx, Arc::new(exporter), 100, Duration::from_millis(50));

        tx.send(sample_violation("a")).unwrap();
        let batch = batches.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(batch.len(), 1);
        drop(tx);
        let _ = handle.join();
    }

    #[test]
    fn null_exporter_discards_without_panicking() {
        NullExporter.export_batch(&[sample_violation("a")]);
    }
}
