//! Error taxonomy for the assertion engine.
//!
//! Each subsystem gets its own closed `thiserror` enum, mirroring the rest of
//! the crate: library code never panics and never reaches for `anyhow`;
//! that is reserved for the CLI glue in [`crate::cli`] and [`crate::config`].

use thiserror::Error;

/// Errors raised while lexing or parsing a rule's DSL source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character '{0}' at line {1}, column {2}")]
    UnexpectedChar(char, usize, usize),

    #[error("unterminated string literal starting at line {0}, column {1}")]
    UnterminatedString(usize, usize),

    #[error("unexpected token {found} at line {line}, column {column}: expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: usize,
        column: usize,
    },

    #[error("unexpected end of input: expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("limit exceeded: {0}")]
    LimitExceeded(#[from] LimitError),

    #[error("unknown identifier '{0}': expected a built-in field or a span selector")]
    UnknownIdent(String),

    #[error("comparison between incompatible literal types: {lhs} vs {rhs}")]
    IncompatibleLiterals { lhs: String, rhs: String },
}

/// The specific §4.1 hard limit that was exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("source length {0} exceeds the 64 KiB limit")]
    SourceTooLong(usize),

    #[error("AST depth {0} exceeds the limit of 256")]
    AstTooDeep(usize),

    #[error("identifier length {0} exceeds the limit of 512 bytes")]
    IdentifierTooLong(usize),

    #[error("string literal length {0} exceeds the 1 MiB limit")]
    StringTooLong(usize),
}

/// Errors raised while evaluating a compiled rule against a span or trace.
///
/// These never reach a CRUD caller; the engine absorbs them and counts them
/// per rule id (see [`crate::engine::RuleEngine::rule_stats`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("type mismatch: cannot compare {lhs} with {rhs}")]
    TypeMismatch { lhs: String, rhs: String },

    #[error("trace has {0} spans, exceeding the evaluation cap")]
    TraceTooLarge(usize),

    #[error("evaluation exceeded its deadline")]
    Timeout,

    #[error("integer overflow while evaluating a numeric expression")]
    Overflow,
}

/// Errors raised by the rule engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule '{0}' not found")]
    NotFound(String),

    #[error("rule '{0}' already exists")]
    DuplicateId(String),

    #[error("rule capacity reached ({0} active rules)")]
    Capacity(usize),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("rule '{0}' is busy with a concurrent mutation")]
    Busy(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by the rule-lifecycle state machine.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("rule '{0}' is not in a state that allows this transition (currently {1:?})")]
    InvalidTransition(String, crate::rule::LifecycleState),

    #[error("rule '{0}' is quarantined and must be edited before it can resume")]
    Quarantined(String),
}

/// Errors raised by a [`crate::store::DurableStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable store I/O error: {0}")]
    Io(String),

    #[error("durable store entry '{0}' not found")]
    NotFound(String),

    #[error("durable store entry '{0}' is corrupt: {1}")]
    Corrupt(String, String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}
