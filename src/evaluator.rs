//! The evaluator: a deterministic function from (compiled AST, span,
//! optional trace context) to a decision of `Match | NoMatch | Error`.

use crate::dsl::ast::{Clause, CompareOp, Expr, Literal, RuleAst};
use crate::error::EvalError;
use crate::span::{AttributeValue, Span, StatusCode};
use crate::trace_accumulator::TraceContext;

/// Default cap on `|trace.spans|` considered during evaluation (§4.2).
pub const DEFAULT_MAX_TRACE_SPANS: usize = 10_000;

/// A single clause (`always` or `never`) that failed, with enough context
/// to populate a violation's metadata map.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseFailure {
    pub clause_index: usize,
    pub kind: &'static str,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The `when` predicate fired and at least one clause failed.
    Match(Vec<ClauseFailure>),
    /// The `when` predicate did not fire, or every clause was satisfied.
    NoMatch,
    Error(EvalError),
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Marker for `span.attributes`, resolved further only by `.get(key)`.
    AttributesRef,
}

pub fn evaluate(ast: &RuleAst, span: &Span, trace: Option<&TraceContext>) -> Decision {
    if let Some(ctx) = trace {
        if ctx.len() > DEFAULT_MAX_TRACE_SPANS {
            return Decision::Error(EvalError::TraceTooLarge(ctx.len()));
        }
    }

    match eval_bool(&ast.when, span, trace) {
        Ok(false) => return Decision::NoMatch,
        Err(e) => return Decision::Error(e),
        Ok(true) => {}
    }

    let mut failures = Vec::new();
    for (index, clause) in ast.clauses.iter().enumerate() {
        match clause {
            Clause::Always(expr) => match eval_bool(expr, span, trace) {
                Ok(true) => {}
                Ok(false) => failures.push(ClauseFailure {
                    clause_index: index,
                    kind: "always",
                    description: format!("expected {expr:?} to hold, but it did not"),
                }),
                Err(e) => return Decision::Error(e),
            },
            Clause::Never(expr) => match eval_bool(expr, span, trace) {
                Ok(false) => {}
                Ok(true) => failures.push(ClauseFailure {
                    clause_index: index,
                    kind: "never",
                    description: format!("expected {expr:?} to not hold, but it did"),
                }),
                Err(e) => return Decision::Error(e),
            },
        }
    }

    if failures.is_empty() {
        Decision::NoMatch
    } else {
        Decision::Match(failures)
    }
}

fn eval_bool(expr: &Expr, span: &Span, trace: Option<&TraceContext>) -> Result<bool, EvalError> {
    match eval(expr, span, trace)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(type_mismatch(&other, "bool")),
    }
}

fn eval(expr: &Expr, span: &Span, trace: Option<&TraceContext>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(Literal::Int(n)) => Ok(Value::Int(*n)),
        Expr::Literal(Literal::Float(n)) => Ok(Value::Float(*n)),
        Expr::Literal(Literal::Str(s)) => Ok(Value::Str(s.clone())),

        Expr::Ident(name) if name == "span" || name == "trace" => {
            // Bare roots only ever appear as the base of a Field/Call; if we
            // reach here directly it's used as a selector pattern match.
            Ok(Value::Bool(span.name == *name))
        }
        Expr::Ident(pattern) => Ok(Value::Bool(span.name == *pattern)),

        Expr::Field(base, field) => eval_field(base, field, span, trace),

        Expr::Call(base, method, args) => eval_call(base, method, args, span, trace),

        Expr::Compare(lhs, op, rhs) => {
            let l = eval(lhs, span, trace)?;
            let r = eval(rhs, span, trace)?;
            Ok(Value::Bool(compare(&l, *op, &r)?))
        }

        Expr::And(l, r) => Ok(Value::Bool(eval_bool(l, span, trace)? && eval_bool(r, span, trace)?)),
        Expr::Or(l, r) => Ok(Value::Bool(eval_bool(l, span, trace)? || eval_bool(r, span, trace)?)),
        Expr::Not(e) => Ok(Value::Bool(!eval_bool(e, span, trace)?)),

        Expr::Count(pattern, op, bound) => {
            let ctx = trace.ok_or(EvalError::TypeMismatch {
                lhs: "count(...)".into(),
                rhs: "span-scoped evaluation (no trace context)".into(),
            })?;
            let count = count_matching(pattern, ctx)? as i64;
            Ok(Value::Bool(compare(
                &Value::Int(count),
                *op,
                &Value::Int(*bound),
            )?))
        }
    }
}

fn eval_field(
    base: &Expr,
    field: &str,
    span: &Span,
    trace: Option<&TraceContext>,
) -> Result<Value, EvalError> {
    if let Expr::Ident(root) = base {
        match root.as_str() {
            "span" => return Ok(span_field(span, field)),
            "trace" => return trace_field(field, trace),
            _ => {}
        }
    }
    // `base.attributes.get(...)` style chains resolve the inner base first.
    let base_val = eval(base, span, trace)?;
    if base_val == Value::AttributesRef && field == "get" {
        return Ok(Value::AttributesRef);
    }
    Err(EvalError::TypeMismatch {
        lhs: format!("{base:?}"),
        rhs: field.to_string(),
    })
}

fn span_field(span: &Span, field: &str) -> Value {
    match field {
        "name" => Value::Str(span.name.clone()),
        "service" => Value::Str(span.service.clone()),
        "duration" => Value::Int(span.duration_nanos() as i64),
        "status" => Value::Str(status_name(span.status).to_string()),
        "kind" => Value::Str(format!("{:?}", span.kind).to_uppercase()),
        "parent_id" => match span.parent_span_id {
            Some(id) => Value::Str(crate::hex_id::encode_8(&id)),
            None => Value::Null,
        },
        "attributes" => Value::AttributesRef,
        _ => Value::Null,
    }
}

fn status_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::Ok => "OK",
        StatusCode::Error => "ERROR",
        StatusCode::Unset => "UNSET",
    }
}

fn trace_field(field: &str, trace: Option<&TraceContext>) -> Result<Value, EvalError> {
    match field {
        "id" => Ok(trace
            .and_then(|t| t.spans().first())
            .map(|s| Value::Str(s.trace_id_hex()))
            .unwrap_or(Value::Null)),
        _ => Err(EvalError::TypeMismatch {
            lhs: "trace".into(),
            rhs: field.to_string(),
        }),
    }
}

fn eval_call(
    base: &Expr,
    method: &str,
    args: &[Expr],
    span: &Span,
    trace: Option<&TraceContext>,
) -> Result<Value, EvalError> {
    // `span.attributes.get("key")`
    if let Expr::Field(inner, field) = base {
        if let Expr::Ident(root) = inner.as_ref() {
            if root == "span" && field == "attributes" && method == "get" {
                let key = match args.first() {
                    Some(Expr::Literal(Literal::Str(s))) => s.clone(),
                    Some(other) => match eval(other, span, trace)? {
                        Value::Str(s) => s,
                        _ => return Err(type_mismatch(&Value::Null, "string key")),
                    },
                    None => return Err(type_mismatch(&Value::Null, "attribute key")),
                };
                return Ok(attribute_value(span.attributes.get(&key)));
            }
        }
    }

    // `pattern.where(predicate)`: pattern selects a span by name, predicate
    // is evaluated against that same span.
    if let Expr::Ident(pattern) = base {
        if pattern != "span" && pattern != "trace" && method == "where" {
            let selector = span.name == *pattern;
            if !selector {
                return Ok(Value::Bool(false));
            }
            let predicate = args
                .first()
                .ok_or_else(|| type_mismatch(&Value::Null, "predicate expression"))?;
            return Ok(Value::Bool(eval_bool(predicate, span, trace)?));
        }
        if pattern == "trace" {
            let ctx = trace.ok_or(EvalError::TypeMismatch {
                lhs: "trace.*".into(),
                rhs: "span-scoped evaluation (no trace context)".into(),
            })?;
            let target = args
                .first()
                .ok_or_else(|| type_mismatch(&Value::Null, "pattern expression"))?;
            return match method {
                "has" => Ok(Value::Bool(count_matching(target, ctx)? > 0)),
                "count" => Ok(Value::Int(count_matching(target, ctx)? as i64)),
                "all" => Ok(Value::Bool(all_matching(target, ctx)?)),
                other => Err(EvalError::TypeMismatch {
                    lhs: "trace".into(),
                    rhs: other.to_string(),
                }),
            };
        }
    }

    Err(EvalError::TypeMismatch {
        lhs: format!("{base:?}"),
        rhs: method.to_string(),
    })
}

fn attribute_value(value: Option<&AttributeValue>) -> Value {
    match value {
        None => Value::Null,
        Some(AttributeValue::String(s)) => Value::Str(s.clone()),
        Some(AttributeValue::Int(i)) => Value::Int(*i),
        Some(AttributeValue::Float(f)) => Value::Float(*f),
        Some(AttributeValue::Bool(b)) => Value::Bool(*b),
    }
}

fn count_matching(pattern: &Expr, ctx: &TraceContext) -> Result<usize, EvalError> {
    let mut n = 0usize;
    for s in ctx.spans() {
        if eval_bool(pattern, s, Some(ctx))? {
            n += 1;
        }
    }
    Ok(n)
}

fn all_matching(pattern: &Expr, ctx: &TraceContext) -> Result<bool, EvalError> {
    for s in ctx.spans() {
        if !eval_bool(pattern, s, Some(ctx))? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn compare(lhs: &Value, op: CompareOp, rhs: &Value) -> Result<bool, EvalError> {
    use CompareOp::*;
    if matches!(lhs, Value::Null) || matches!(rhs, Value::Null) {
        // Null semantics (§4.2): any comparison involving a missing
        // attribute is false, never an error.
        return Ok(false);
    }
    let ord = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
        _ => return Err(type_mismatch(lhs, &format!("{rhs:?}"))),
    };
    let ord = ord.ok_or(EvalError::TypeMismatch {
        lhs: format!("{lhs:?}"),
        rhs: format!("{rhs:?}"),
    })?;
    Ok(match op {
        Eq => ord == std::cmp::Ordering::Equal,
        Ne => ord != std::cmp::Ordering::Equal,
        Lt => ord == std::cmp::Ordering::Less,
        Le => ord != std::cmp::Ordering::Greater,
        Gt => ord == std::cmp::Ordering::Greater,
        Ge => ord != std::cmp::Ordering::Less,
    })
}

fn type_mismatch(value: &Value, expected: &str) -> EvalError {
    EvalError::TypeMismatch {
        lhs: format!("{value:?}"),
        rhs: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_source;
    use crate::span::SpanKind;

    fn span(name: &str, duration_ns: u64) -> Span {
        Span::new(
            [1; 16],
            [1; 8],
            None,
            name,
            "svc",
            SpanKind::Server,
            StatusCode::Ok,
            0,
            duration_ns,
        )
    }

    #[test]
    fn span_scoped_match_fires_violation() {
        let ast = parse_source(
            r#"when { http-request.where(span.duration > 1000000000) } always { span.status == "ERROR" }"#,
        )
        .unwrap();
        let s = span("http-request", 2_000_000_000);
        match evaluate(&ast, &s, None) {
            Decision::Match(failures) => assert_eq!(failures.len(), 1),
            other => panic!("expected Match, got {other:?}"),
        }
    }

    #[test]
    fn span_scoped_no_match_when_when_false() {
        let ast = parse_source(
            r#"when { http-request.where(span.duration > 1000000000) } always { span.status == "ERROR" }"#,
        )
        .unwrap();
        let s = span("other-op", 2_000_000_000);
        assert_eq!(evaluate(&ast, &s, None), Decision::NoMatch);
    }

    #[test]
    fn never_clause_fires_when_forbidden_pattern_present() {
        let ast = parse_source(r#"when { checkout } never { payment.where(span.status == "ERROR") }"#)
            .unwrap();
        let mut ctx = TraceContext::new();
        ctx.push(span("checkout", 1));
        let mut failing_payment = span("payment", 1);
        failing_payment.status = StatusCode::Error;
        ctx.push(failing_payment);

        let trigger = span("checkout", 1);
        match evaluate(&ast, &trigger, Some(&ctx)) {
            Decision::Match(f) => assert_eq!(f[0].kind, "never"),
            other => panic!("expected Match, got {other:?}"),
        }
    }

    #[test]
    fn missing_attribute_compares_false_not_error() {
        let ast = parse_source(
            r#"when { checkout.where(span.attributes.get("amount") > 1000) } always { y }"#,
        )
        .unwrap();
        let s = span("checkout", 1);
        assert_eq!(evaluate(&ast, &s, None), Decision::NoMatch);
    }

    #[test]
    fn type_mismatch_yields_error_decision() {
        let ast = parse_source(r#"when { checkout.where("x" > 5) } always { y }"#).unwrap();
        let s = span("checkout", 1);
        assert!(matches!(evaluate(&ast, &s, None), Decision::Error(_)));
    }

    #[test]
    fn trace_scoped_count_clause() {
        let ast = parse_source(r#"when { checkout } always { count(retry) < 3 }"#).unwrap();
        let mut ctx = TraceContext::new();
        ctx.push(span("checkout", 1));
        ctx.push(span("retry", 1));
        ctx.push(span("retry", 1));
        ctx.push(span("retry", 1));
        let trigger = span("checkout", 1);
        match evaluate(&ast, &trigger, Some(&ctx)) {
            Decision::Match(_) => {}
            other => panic!("expected Match (3 retries >= 3 bound), got {other:?}"),
        }
    }

    #[test]
    fn trace_too_large_yields_error() {
        let ast = parse_source(r#"when { checkout } always { count(retry) < 3 }"#).unwrap();
        let mut big = TraceContext::new();
        for i in 0..(DEFAULT_MAX_TRACE_SPANS + 1) {
            big.push(Span::new(
                [1; 16],
                [(i % 255) as u8; 8],
                None,
                "retry",
                "svc",
                SpanKind::Internal,
                StatusCode::Ok,
                0,
                1,
            ));
        }
        let trigger = span("checkout", 1);
        assert!(matches!(
            evaluate(&ast, &trigger, Some(&big)),
            Decision::Error(EvalError::TraceTooLarge(_))
        ));
    }
}
