//! Violation records and their optional HMAC-SHA256 signature.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::rule::Severity;
use crate::ulid;

type HmacSha256 = Hmac<Sha256>;

/// A firing of a rule's predicate against a specific span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViolationRecord {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub trace_id: String,
    pub span_id: String,
    pub timestamp_nanos: u64,
    pub metadata: BTreeMap<String, String>,
    /// Set when a firing is attributed to a trace context that had already
    /// been flushed/evicted (§4.5): downstream consumers know the
    /// evaluation may be based on an incomplete trace.
    pub evicted: bool,
    pub signature: Option<String>,
}

impl ViolationRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_id: impl Into<String>,
        rule_name: impl Into<String>,
        severity: Severity,
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        timestamp_nanos: u64,
        metadata: BTreeMap<String, String>,
        evicted: bool,
    ) -> Self {
        Self {
            id: ulid::new_id(),
            rule_id: rule_id.into(),
            rule_name: rule_name.into(),
            severity,
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            timestamp_nanos,
            metadata,
            evicted,
            signature: None,
        }
    }

    /// Fields signed, in order, joined by the unit separator `\x1f` (§6).
    fn signing_payload(&self) -> String {
        [
            self.id.as_str(),
            self.rule_id.as_str(),
            self.rule_name.as_str(),
            severity_str(self.severity),
            "",
        ]
        .join("\x1f")
    }

    pub fn sign(&mut self, secret: &[u8]) {
        let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
        mac.update(self.signing_payload().as_bytes());
        let bytes = mac.finalize().into_bytes();
        self.signature = Some(hex::encode(bytes));
    }

    pub fn verify(&self, secret: &[u8]) -> bool {
        let Some(expected_hex) = &self.signature else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
        mac.update(self.signing_payload().as_bytes());
        let Ok(expected_bytes) = hex::decode(expected_hex) else {
            return false;
        };
        mac.verify_slice(&expected_bytes).is_ok()
    }
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Critical => "CRITICAL",
        Severity::High => "HIGH",
        Severity::Medium => "MEDIUM",
        Severity::Low => "LOW",
    }
}
