//! Lexical tokens for the rule DSL.

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    When,
    Always,
    Never,
    And,
    Or,
    Not,
    Where,
    Count,

    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Dot,
    Comma,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }
}

pub fn keyword(ident: &str) -> Option<TokenKind> {
    match ident {
        "when" => Some(TokenKind::When),
        "always" => Some(TokenKind::Always),
        "never" => Some(TokenKind::Never),
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "not" => Some(TokenKind::Not),
        "where" => Some(TokenKind::Where),
        "count" => Some(TokenKind::Count),
        _ => None,
    }
}

/// Inverse of [`keyword`]. `where`/`count`/etc. are reserved words in
/// statement position but also valid method names after `.` (`span.where(...)`,
/// `trace.count(...)`), so the parser needs their text back to build a
/// `Call`/`Field` node.
pub fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::When => Some("when"),
        TokenKind::Always => Some("always"),
        TokenKind::Never => Some("never"),
        TokenKind::And => Some("and"),
        TokenKind::Or => Some("or"),
        TokenKind::Not => Some("not"),
        TokenKind::Where => Some("where"),
        TokenKind::Count => Some("count"),
        _ => None,
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier '{s}'"),
            TokenKind::Int(n) => write!(f, "integer {n}"),
            TokenKind::Float(n) => write!(f, "float {n}"),
            TokenKind::Str(s) => write!(f, "string \"{s}\""),
            TokenKind::When => write!(f, "'when'"),
            TokenKind::Always => write!(f, "'always'"),
            TokenKind::Never => write!(f, "'never'"),
            TokenKind::And => write!(f, "'and'"),
            TokenKind::Or => write!(f, "'or'"),
            TokenKind::Not => write!(f, "'not'"),
            TokenKind::Where => write!(f, "'where'"),
            TokenKind::Count => write!(f, "'count'"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::LtEq => write!(f, "'<='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::GtEq => write!(f, "'>='"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}
