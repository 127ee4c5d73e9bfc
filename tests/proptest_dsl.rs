//! Property-based coverage for parser totality and evaluator determinism.

use betrace::dsl;
use betrace::evaluator::{self, Decision};
use betrace::span::{Span, SpanKind, StatusCode};
use proptest::prelude::*;

fn arb_span_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

proptest! {
    /// The parser (and static validator) must never panic on arbitrary
    /// byte-ish input, only ever return Ok or a typed ParseError.
    #[test]
    fn compile_never_panics_on_arbitrary_strings(s in "\\PC{0,200}") {
        let _ = dsl::compile(&s);
    }

    /// Any well-formed `when { <name> } always { <name2> }` rule compiles
    /// and evaluating it twice against the same span yields the same
    /// decision both times.
    #[test]
    fn evaluation_is_deterministic(
        when_name in arb_span_name(),
        always_name in arb_span_name(),
        span_name in arb_span_name(),
    ) {
        let source = format!("when {{ {when_name} }} always {{ {always_name} }}");
        if let Ok(ast) = dsl::compile(&source) {
            let span = Span::new(
                [1; 16],
                [2; 8],
                None,
                span_name,
                "svc",
                SpanKind::Internal,
                StatusCode::Ok,
                0,
                1,
            );
            let first = evaluator::evaluate(&ast, &span, None);
            let second = evaluator::evaluate(&ast, &span, None);
            prop_assert_eq!(first, second);
        }
    }

    /// A span whose name matches neither the `when` selector nor any
    /// clause selector never produces a Match.
    #[test]
    fn non_matching_span_name_never_fires(
        when_name in arb_span_name(),
        other_name in arb_span_name(),
    ) {
        prop_assume!(when_name != other_name);
        let source = format!("when {{ {when_name} }} always {{ y }}");
        if let Ok(ast) = dsl::compile(&source) {
            let span = Span::new(
                [1; 16],
                [2; 8],
                None,
                other_name,
                "svc",
                SpanKind::Internal,
                StatusCode::Ok,
                0,
                1,
            );
            let decision = evaluator::evaluate(&ast, &span, None);
            prop_assert_eq!(decision, Decision::NoMatch);
        }
    }
}
