//! Recursive-descent parser for the rule DSL.
//!
//! Grammar (LL(1)):
//!
//! ```text
//! rule       := "when" block clause+
//! clause     := ("always" | "never") block
//! block      := "{" expr "}"
//! expr       := or_expr
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := not_expr ("and" not_expr)*
//! not_expr   := "not" not_expr | compare_expr
//! compare_expr := postfix (cmp_op postfix)?
//! postfix    := primary ("." ident ("(" arg_list? ")")?)*
//! primary    := ident | int | float | string
//!             | "count" "(" expr ")" cmp_op int
//!             | "(" expr ")"
//! arg_list   := expr ("," expr)*
//! ```

use crate::dsl::ast::{Clause, CompareOp, Expr, Literal, RuleAst};
use crate::dsl::lexer::Lexer;
use crate::dsl::token::{Token, TokenKind};
use crate::error::{LimitError, ParseError};

pub const MAX_AST_DEPTH: usize = 256;

pub fn parse(source: &str) -> Result<RuleAst, ParseError> {
    let tokens = Lexer::new(source)?.tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.parse_rule()?;
    let depth = ast.depth();
    if depth > MAX_AST_DEPTH {
        return Err(ParseError::LimitExceeded(LimitError::AstTooDeep(depth)));
    }
    Ok(ast)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else if self.peek().kind == TokenKind::Eof {
            Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            })
        } else {
            let found = self.peek().kind.to_string();
            let (line, column) = (self.peek().line, self.peek().column);
            Err(ParseError::UnexpectedToken {
                found,
                expected: expected.to_string(),
                line,
                column,
            })
        }
    }

    fn parse_rule(&mut self) -> Result<RuleAst, ParseError> {
        self.expect(&TokenKind::When, "'when'")?;
        let when = self.parse_block()?;

        let mut clauses = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Always => {
                    self.advance();
                    clauses.push(Clause::Always(self.parse_block()?));
                }
                TokenKind::Never => {
                    self.advance();
                    clauses.push(Clause::Never(self.parse_block()?));
                }
                _ => break,
            }
        }
        if clauses.is_empty() {
            return Err(ParseError::UnexpectedEof {
                expected: "'always' or 'never' block".to_string(),
            });
        }
        self.expect(&TokenKind::Eof, "end of input")?;
        Ok(RuleAst { when, clauses })
    }

    fn parse_block(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(expr)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.peek().kind == TokenKind::Or {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.peek().kind == TokenKind::And {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::Not {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_postfix()?;
        let op = match &self.peek().kind {
            TokenKind::EqEq => Some(CompareOp::Eq),
            TokenKind::NotEq => Some(CompareOp::Ne),
            TokenKind::Lt => Some(CompareOp::Lt),
            TokenKind::LtEq => Some(CompareOp::Le),
            TokenKind::Gt => Some(CompareOp::Gt),
            TokenKind::GtEq => Some(CompareOp::Ge),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let rhs = self.parse_postfix()?;
                Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)))
            }
            None => Ok(lhs),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.peek().kind != TokenKind::Dot {
                break;
            }
            self.advance();
            let name = match &self.advance().kind {
                TokenKind::Ident(s) => s.clone(),
                other => match crate::dsl::token::keyword_text(other) {
                    Some(text) => text.to_string(),
                    None => {
                        return Err(ParseError::UnexpectedToken {
                            found: other.to_string(),
                            expected: "identifier after '.'".to_string(),
                            line: self.peek().line,
                            column: self.peek().column,
                        })
                    }
                },
            };
            if self.peek().kind == TokenKind::LParen {
                self.advance();
                let mut args = Vec::new();
                if self.peek().kind != TokenKind::RParen {
                    args.push(self.parse_expr()?);
                    while self.peek().kind == TokenKind::Comma {
                        self.advance();
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
                expr = Expr::Call(Box::new(expr), name, args);
            } else {
                expr = Expr::Field(Box::new(expr), name);
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::Count => {
                self.advance();
                self.expect(&TokenKind::LParen, "'('")?;
                let pattern = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                let op = match &self.advance().kind {
                    TokenKind::EqEq => CompareOp::Eq,
                    TokenKind::NotEq => CompareOp::Ne,
                    TokenKind::Lt => CompareOp::Lt,
                    TokenKind::LtEq => CompareOp::Le,
                    TokenKind::Gt => CompareOp::Gt,
                    TokenKind::GtEq => CompareOp::Ge,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            found: other.to_string(),
                            expected: "comparison operator after count(...)".to_string(),
                            line: self.peek().line,
                            column: self.peek().column,
                        })
                    }
                };
                // The lexer has no unary-minus syntax, so a source like
                // `count(y) < -1` already fails to tokenize (`UnexpectedChar('-', ..)`)
                // before parsing ever reaches this bound; every `Int` token
                // that does arrive here is already non-negative.
                let bound_tok = self.advance();
                let bound = match bound_tok.kind {
                    TokenKind::Int(n) => n,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            found: other.to_string(),
                            expected: "integer bound".to_string(),
                            line: bound_tok.line,
                            column: bound_tok.column,
                        })
                    }
                };
                Ok(Expr::Count(Box::new(pattern), op, bound))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEof {
                expected: "expression".to_string(),
            }),
            other => Err(ParseError::UnexpectedToken {
                found: other.to_string(),
                expected: "expression".to_string(),
                line: self.peek().line,
                column: self.peek().column,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_span_rule() {
        let src = r#"when { http-request.where(span.duration > 1s) } always { error.logged }"#;
        let ast = parse(src).unwrap();
        assert_eq!(ast.clauses.len(), 1);
        assert!(ast.is_span_scoped());
    }

    #[test]
    fn where_is_a_valid_method_name_after_a_dot() {
        let src = r#"when { checkout.where(amount > 1000) } always { fraud-check }"#;
        let ast = parse(src).unwrap();
        match &ast.when {
            Expr::Call(_, name, args) => {
                assert_eq!(name, "where");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected a Call node, got {other:?}"),
        }
    }

    #[test]
    fn parses_trace_scoped_rule() {
        let src = r#"when { payment } never { trace.has(fraud-check) }"#;
        let ast = parse(src).unwrap();
        assert!(!ast.is_span_scoped());
    }

    #[test]
    fn parses_count_clause() {
        let src = r#"when { span.name == "retry" } always { count(retry) < 5 }"#;
        let ast = parse(src).unwrap();
        assert!(!ast.is_span_scoped());
    }

    #[test]
    fn rejects_missing_clause() {
        let src = "when { x }";
        assert!(parse(src).is_err());
    }

    #[test]
    fn rejects_negative_count_bound_at_the_lexer() {
        // No unary-minus syntax exists in this grammar, so `-1` is rejected
        // while tokenizing, not while parsing the count bound.
        let src = "when { x } always { count(y) < -1 }";
        let result = parse(src);
        assert!(matches!(
            result,
            Err(ParseError::UnexpectedChar('-', _, _))
        ));
    }

    #[test]
    fn rejects_trailing_garbage() {
        let src = "when { x } always { y } garbage";
        assert!(parse(src).is_err());
    }

    #[test]
    fn never_panics_on_arbitrary_source() {
        for sample in ["", "when", "when {", "{{{{{{", "always never when", "\"\"\"\""]
        {
            let _ = parse(sample);
        }
    }

    #[test]
    fn enforces_ast_depth_limit() {
        let mut src = String::from("when { ");
        for _ in 0..300 {
            src.push_str("not ");
        }
        src.push_str("x }\nalways { y }");
        let result = parse(&src);
        assert!(result.is_err());
    }

    #[test]
    fn respects_operator_precedence() {
        // and binds tighter than or
        let src = "when { a or b and c } always { z }";
        let ast = parse(src).unwrap();
        match ast.when {
            Expr::Or(_, rhs) => assert!(matches!(*rhs, Expr::And(_, _))),
            _ => panic!("expected top-level Or"),
        }
    }
}
