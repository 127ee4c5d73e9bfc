//! Hand-rolled lexer for the rule DSL.
//!
//! No parser-combinator crate is in the dependency stack, so tokenizing is
//! a plain character-by-character scan, the same way the crate's other
//! hand-written parsers (filter expressions, decision-trace lines) work.
//! The lexer must never panic on arbitrary bytes; malformed input always
//! produces a `ParseError`.

use crate::error::{LimitError, ParseError};
use crate::dsl::token::{keyword, Token, TokenKind};

pub const MAX_SOURCE_LEN: usize = 64 * 1024;
pub const MAX_IDENT_LEN: usize = 512;
pub const MAX_STRING_LEN: usize = 1024 * 1024;

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(ParseError::LimitExceeded(LimitError::SourceTooLong(
                source.len(),
            )));
        }
        Ok(Self {
            chars: source.char_indices().peekable(),
            source,
            line: 1,
            column: 1,
        })
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace_and_comments();
        let (line, column) = (self.line, self.column);

        let c = match self.peek() {
            None => return Ok(Token::new(TokenKind::Eof, line, column)),
            Some(c) => c,
        };

        if c.is_alphabetic() || c == '_' {
            return self.lex_ident_or_keyword(line, column);
        }
        if c.is_ascii_digit() {
            return self.lex_number(line, column);
        }
        if c == '"' {
            return self.lex_string(line, column);
        }

        self.advance();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '=' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::EqEq
            }
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::NotEq
            }
            '<' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::LtEq
            }
            '<' => TokenKind::Lt,
            '>' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::GtEq
            }
            '>' => TokenKind::Gt,
            other => return Err(ParseError::UnexpectedChar(other, line, column)),
        };
        Ok(Token::new(kind, line, column))
    }

    fn lex_ident_or_keyword(&mut self, line: usize, column: usize) -> Result<Token, ParseError> {
        let start = self.current_byte_offset();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.current_byte_offset();
        let text = &self.source[start..end];
        if text.len() > MAX_IDENT_LEN {
            return Err(ParseError::LimitExceeded(LimitError::IdentifierTooLong(
                text.len(),
            )));
        }
        let kind = keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()));
        Ok(Token::new(kind, line, column))
    }

    fn lex_number(&mut self, line: usize, column: usize) -> Result<Token, ParseError> {
        let start = self.current_byte_offset();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !is_float {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }
        let end = self.current_byte_offset();
        let digits = &self.source[start..end];

        // Desugar duration suffixes (ns/us/ms/s) into nanosecond integers.
        let suffix_start = self.current_byte_offset();
        let mut suffix = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                suffix.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if !suffix.is_empty() {
            let multiplier: Option<i64> = match suffix.as_str() {
                "ns" => Some(1),
                "us" => Some(1_000),
                "ms" => Some(1_000_000),
                "s" => Some(1_000_000_000),
                _ => None,
            };
            if let Some(mult) = multiplier {
                let value: f64 = digits.parse().unwrap_or(0.0);
                let nanos = (value * mult as f64) as i64;
                return Ok(Token::new(TokenKind::Int(nanos), line, column));
            }
            // Not a recognized duration suffix: treat it as a separate
            // identifier token error by rewinding is impractical here, so
            // surface it directly as an unexpected-character error on the
            // suffix's first byte.
            let bad_char = suffix.chars().next().unwrap_or('?');
            return Err(ParseError::UnexpectedChar(bad_char, line, self.column));
        }
        let _ = suffix_start;

        if is_float {
            let value: f64 = digits
                .parse()
                .map_err(|_| ParseError::UnexpectedChar('.', line, column))?;
            Ok(Token::new(TokenKind::Float(value), line, column))
        } else {
            let value: i64 = digits
                .parse()
                .map_err(|_| ParseError::UnexpectedChar('0', line, column))?;
            Ok(Token::new(TokenKind::Int(value), line, column))
        }
    }

    fn lex_string(&mut self, line: usize, column: usize) -> Result<Token, ParseError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(ParseError::UnterminatedString(line, column)),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err(ParseError::UnterminatedString(line, column)),
                },
                Some(c) => value.push(c),
            }
            if value.len() > MAX_STRING_LEN {
                return Err(ParseError::LimitExceeded(LimitError::StringTooLong(
                    value.len(),
                )));
            }
        }
        Ok(Token::new(TokenKind::Str(value), line, column))
    }

    fn current_byte_offset(&mut self) -> usize {
        match self.chars.peek() {
            Some((idx, _)) => *idx,
            None => self.source.len(),
        }
    }
}
