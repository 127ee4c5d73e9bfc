//! The `Rule` record and its lifecycle state enum.

use serde::{Deserialize, Serialize};

use crate::dsl::RuleAst;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// One state per rule id; see the lifecycle table (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Draft,
    Validating,
    Compiled,
    Live,
    Persisted,
    Retiring,
    Quarantined,
    Deleted,
}

/// A named, user-authored assertion.
///
/// The identifier is immutable once assigned. `source` and `ast` are kept
/// consistent; an update to one always replaces the other atomically,
/// never independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub source: String,
    #[serde(skip)]
    pub ast: Option<RuleAst>,
    pub severity: Severity,
    pub enabled: bool,
    pub description: String,
    pub created_at_millis: u64,
    pub updated_at_millis: u64,
    pub state: LifecycleState,
    /// Lamport timestamp of this rule's most recent lifecycle transition,
    /// stamped by [`crate::lifecycle::Lifecycle`]; orders concurrent
    /// create/update/delete calls across rule ids causally, independent of
    /// wall-clock skew.
    pub generation: u64,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        now_millis: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source: source.into(),
            ast: None,
            severity,
            enabled: true,
            description: description.into(),
            created_at_millis: now_millis,
            updated_at_millis: now_millis,
            state: LifecycleState::Draft,
            generation: 0,
        }
    }

    pub fn is_span_scoped(&self) -> bool {
        self.ast.as_ref().map(RuleAst::is_span_scoped).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rule_starts_in_draft() {
        let rule = Rule::new("r1", "no-fraud-bypass", "when { x } always { y }", Severity::High, "", 0);
        assert_eq!(rule.state, LifecycleState::Draft);
        assert!(rule.enabled);
    }
}
