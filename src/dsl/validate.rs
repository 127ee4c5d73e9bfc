//! Static semantic validation of a parsed rule.
//!
//! Runs once, after parsing: checks every identifier reference resolves to
//! a built-in root, a selector pattern, or a recognized method call shape,
//! and that literal-vs-literal comparisons are type-homogeneous. Deeper type
//! errors (e.g. comparing a span field of unknown runtime type against a
//! string) are left to the evaluator, which never panics and reports them
//! as [`crate::error::EvalError::TypeMismatch`].

use crate::dsl::ast::{Clause, Expr, Literal, RuleAst};
use crate::error::ParseError;

pub fn validate(ast: &RuleAst) -> Result<(), ParseError> {
    check_idents(&ast.when)?;
    for clause in &ast.clauses {
        let e = match clause {
            Clause::Always(e) | Clause::Never(e) => e,
        };
        check_idents(e)?;
    }

    check_literal_types(&ast.when)?;
    for clause in &ast.clauses {
        let e = match clause {
            Clause::Always(e) | Clause::Never(e) => e,
        };
        check_literal_types(e)?;
    }
    Ok(())
}

fn is_builtin_root(expr: &Expr) -> bool {
    matches!(expr, Expr::Ident(name) if name == "span" || name == "trace")
}

/// Walks an expression checking that every identifier is used in one of the
/// shapes the evaluator actually understands: a bare selector pattern
/// (`fraud-check`), a `selector.where(predicate)` call, a `span.*`/`trace.*`
/// field or method chain, or an argument to `has`/`count`/`all`/`where`.
fn check_idents(expr: &Expr) -> Result<(), ParseError> {
    match expr {
        Expr::Literal(_) => Ok(()),
        // Any bare identifier other than the two built-in roots is a valid
        // span-name selector pattern on its own (§4.1).
        Expr::Ident(_) => Ok(()),
        Expr::Field(base, field) => {
            if is_builtin_root(base) {
                Ok(())
            } else {
                Err(unresolvable(base, field))
            }
        }
        Expr::Call(base, method, args) => {
            for arg in args {
                check_idents(arg)?;
            }
            match base.as_ref() {
                Expr::Ident(name) if name == "trace" => {
                    if matches!(method.as_str(), "has" | "count" | "all") {
                        Ok(())
                    } else {
                        Err(unresolvable(base, method))
                    }
                }
                Expr::Ident(name) if name == "span" => Err(unresolvable(base, method)),
                Expr::Ident(_) => {
                    // `selector.where(predicate)`
                    if method == "where" {
                        Ok(())
                    } else {
                        Err(unresolvable(base, method))
                    }
                }
                Expr::Field(inner, field) if is_builtin_root(inner) && field == "attributes" => {
                    if method == "get" {
                        Ok(())
                    } else {
                        Err(unresolvable(base, method))
                    }
                }
                _ => check_idents(base),
            }
        }
        Expr::Compare(l, _, r) | Expr::And(l, r) | Expr::Or(l, r) => {
            check_idents(l)?;
            check_idents(r)
        }
        Expr::Not(e) => check_idents(e),
        Expr::Count(e, _, _) => check_idents(e),
    }
}

fn unresolvable(base: &Expr, suffix: &str) -> ParseError {
    let base_name = match base {
        Expr::Ident(name) => name.clone(),
        other => format!("{other:?}"),
    };
    ParseError::UnknownIdent(format!("{base_name}.{suffix}"))
}

fn literal_type_name(lit: &Literal) -> &'static str {
    match lit {
        Literal::Int(_) => "number",
        Literal::Float(_) => "number",
        Literal::Str(_) => "string",
    }
}

fn check_literal_types(expr: &Expr) -> Result<(), ParseError> {
    match expr {
        Expr::Compare(l, _op, r) => {
            if let (Expr::Literal(a), Expr::Literal(b)) = (l.as_ref(), r.as_ref()) {
                if literal_type_name(a) != literal_type_name(b) {
                    return Err(ParseError::IncompatibleLiterals {
                        lhs: literal_type_name(a).to_string(),
                        rhs: literal_type_name(b).to_string(),
                    });
                }
            }
            check_literal_types(l)?;
            check_literal_types(r)
        }
        Expr::And(l, r) | Expr::Or(l, r) => {
            check_literal_types(l)?;
            check_literal_types(r)
        }
        Expr::Not(e) => check_literal_types(e),
        Expr::Call(base, _, args) => {
            check_literal_types(base)?;
            for arg in args {
                check_literal_types(arg)?;
            }
            Ok(())
        }
        Expr::Field(base, _) => check_literal_types(base),
        Expr::Count(e, _, _) => check_literal_types(e),
        Expr::Literal(_) | Expr::Ident(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse;

    #[test]
    fn accepts_span_and_trace_builtins() {
        let ast = parse(r#"when { http.where(span.duration > 1s) } always { trace.id }"#).unwrap();
        assert!(validate(&ast).is_ok());
    }

    #[test]
    fn accepts_bare_selector_pattern_as_a_whole_clause() {
        let ast = parse(r#"when { checkout.where(span.status == "OK") } always { fraud-check }"#)
            .unwrap();
        assert!(validate(&ast).is_ok());
    }

    #[test]
    fn accepts_trace_scoped_rule_with_when_as_bare_selector() {
        let ast = parse(r#"when { payment } never { trace.count(fraud-check) == 0 }"#).unwrap();
        assert!(validate(&ast).is_ok());
    }

    #[test]
    fn rejects_unresolvable_field_root() {
        let ast = parse("when { mystery.field } always { y }").unwrap();
        assert!(matches!(validate(&ast), Err(ParseError::UnknownIdent(_))));
    }

    #[test]
    fn rejects_method_call_on_span_other_than_attribute_access() {
        let ast = parse(r#"when { span.bogus(1) } always { y }"#).unwrap();
        assert!(matches!(validate(&ast), Err(ParseError::UnknownIdent(_))));
    }

    #[test]
    fn rejects_mismatched_literal_comparison() {
        let ast = parse(r#"when { x } always { "a" == 5 }"#).unwrap();
        assert!(matches!(
            validate(&ast),
            Err(ParseError::IncompatibleLiterals { .. })
        ));
    }

    #[test]
    fn accepts_count_clause_with_matching_literal_types() {
        let ast = parse(r#"when { x } always { count(y) < 5 }"#).unwrap();
        assert!(validate(&ast).is_ok());
    }
}
