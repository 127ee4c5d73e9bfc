//! The rule DSL: lexer, parser, AST, and static validation.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod validate;

pub use ast::{Clause, CompareOp, Expr, Literal, RuleAst};
pub use parser::parse as parse_source;

use crate::error::ParseError;

/// Parse and statically validate a rule's source text in one call. This is
/// the entry point the rule-lifecycle FSM uses during the `Validating`
/// state (§4.4) and that the CLI's `validate` subcommand exposes directly
/// (§6 `Validate` operation).
pub fn compile(source: &str) -> Result<RuleAst, ParseError> {
    let ast = parser::parse(source)?;
    validate::validate(&ast)?;
    Ok(ast)
}
