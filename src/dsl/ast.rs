//! Abstract syntax tree for the rule DSL.
//!
//! The node set is closed (literals, field access, comparison, boolean
//! connectives, `where`, `count`, trace methods); evaluation dispatches on
//! it in a single pass (see [`crate::evaluator`]) rather than through any
//! reflective mechanism.

#[derive(Debug, Clone, PartialEq)]
pub struct RuleAst {
    pub when: Expr,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Always(Expr),
    Never(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// A bare identifier: either a built-in root (`span`, `trace`) or a span
    /// name used as a selector pattern (e.g. `fraud-check`).
    Ident(String),
    /// `base.field`
    Field(Box<Expr>, String),
    /// `base.method(args...)`, covers `.where(...)`, `.has(...)`,
    /// `.count(...)`, `.all(...)`, and attribute lookup `.attributes.get(key)`.
    Call(Box<Expr>, String, Vec<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// `count(pattern) op bound`
    Count(Box<Expr>, CompareOp, i64),
}

impl RuleAst {
    /// Maximum nesting depth across `when` and every clause.
    pub fn depth(&self) -> usize {
        let mut max = self.when.depth();
        for clause in &self.clauses {
            let d = match clause {
                Clause::Always(e) | Clause::Never(e) => e.depth(),
            };
            max = max.max(d);
        }
        max
    }

    /// `true` if every leaf of `when` references only `span.*` fields and no
    /// clause references `trace.*` or `count`, i.e. the rule never needs a
    /// trace context to evaluate.
    pub fn is_span_scoped(&self) -> bool {
        let mut scoped = !self.when.references_trace();
        for clause in &self.clauses {
            let e = match clause {
                Clause::Always(e) | Clause::Never(e) => e,
            };
            scoped &= !e.references_trace();
        }
        scoped
    }
}

impl Expr {
    pub fn depth(&self) -> usize {
        match self {
            Expr::Literal(_) | Expr::Ident(_) => 1,
            Expr::Field(base, _) => 1 + base.depth(),
            Expr::Call(base, _, args) => {
                1 + args
                    .iter()
                    .map(Expr::depth)
                    .max()
                    .unwrap_or(0)
                    .max(base.depth())
            }
            Expr::Compare(l, _, r) => 1 + l.depth().max(r.depth()),
            Expr::And(l, r) | Expr::Or(l, r) => 1 + l.depth().max(r.depth()),
            Expr::Not(e) => 1 + e.depth(),
            Expr::Count(e, _, _) => 1 + e.depth(),
        }
    }

    pub fn references_trace(&self) -> bool {
        match self {
            Expr::Literal(_) => false,
            Expr::Ident(name) => name == "trace",
            Expr::Field(base, _) => base.references_trace(),
            Expr::Call(base, method, args) => {
                matches!(method.as_str(), "has" | "count" | "all")
                    || base.references_trace()
                    || args.iter().any(Expr::references_trace)
            }
            Expr::Compare(l, _, r) => l.references_trace() || r.references_trace(),
            Expr::And(l, r) | Expr::Or(l, r) => l.references_trace() || r.references_trace(),
            Expr::Not(e) => e.references_trace(),
            Expr::Count(_, _, _) => true,
        }
    }
}
