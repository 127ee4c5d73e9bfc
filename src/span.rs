//! Span ingestion record.
//!
//! Field layout mirrors the flat Parquet-compatible span schema this crate
//! carried for trace records, generalized to OTLP's kind/status vocabulary
//! and a typed attribute map instead of a JSON blob, since the DSL needs to
//! do scalar comparisons against attributes at evaluation time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::hex_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanKind {
    #[default]
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    #[default]
    Unset,
    Ok,
    Error,
}

/// A scalar attribute value. The DSL only ever compares against these four
/// shapes; structured/array attributes are out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{s}"),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A single ingested span. Immutable once constructed; the engine never
/// mutates a span after `Submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub parent_span_id: Option<[u8; 8]>,
    pub name: String,
    pub service: String,
    pub kind: SpanKind,
    pub status: StatusCode,
    pub start_time_nanos: u64,
    pub end_time_nanos: u64,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Span {
    pub fn new(
        trace_id: [u8; 16],
        span_id: [u8; 8],
        parent_span_id: Option<[u8; 8]>,
        name: impl Into<String>,
        service: impl Into<String>,
        kind: SpanKind,
        status: StatusCode,
        start_time_nanos: u64,
        end_time_nanos: u64,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id,
            name: name.into(),
            service: service.into(),
            kind,
            status,
            start_time_nanos,
            end_time_nanos,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn duration_nanos(&self) -> u64 {
        self.end_time_nanos.saturating_sub(self.start_time_nanos)
    }

    pub fn trace_id_hex(&self) -> String {
        hex_id::encode_16(&self.trace_id)
    }

    pub fn span_id_hex(&self) -> String {
        hex_id::encode_8(&self.span_id)
    }
}
