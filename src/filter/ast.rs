use super::value::Value;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// Comparison operators. `!=` and `<>` both map to `Ne`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }

    #[must_use]
    pub const fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Lt => ordering.is_lt(),
            Self::Gt => ordering.is_gt(),
            Self::Le => ordering.is_le(),
            Self::Ge => ordering.is_ge(),
        }
    }

    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Pattern operator flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// SQL wildcards, case-sensitive, anchored
    Like,
    /// SQL wildcards, case-insensitive, anchored
    Ilike,
    /// Raw regular expression, unanchored search
    Rlike,
}

impl PatternKind {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Ilike => "ILIKE",
            Self::Rlike => "RLIKE",
        }
    }

    /// Build the regex for a pattern string
    ///
    /// # Errors
    ///
    /// Returns the regex compile error rendered as a string.
    pub fn build_regex(self, pattern: &str) -> Result<Regex, String> {
        let source = match self {
            Self::Rlike => pattern.to_string(),
            Self::Like => format!("^{}$", like_to_regex(pattern)),
            Self::Ilike => format!("(?i)^{}$", like_to_regex(pattern)),
        };
        Regex::new(&source).map_err(|e| e.to_string())
    }
}

/// Translate SQL wildcards to regex syntax, escaping everything else.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out
}

/// LIKE / ILIKE / RLIKE node with its lazily compiled regex
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub left: Box<Expr>,
    pub pattern: Box<Expr>,
    pub negated: bool,
    pub(crate) regex: OnceLock<Regex>,
}

impl PatternMatch {
    #[must_use]
    pub fn new(kind: PatternKind, left: Expr, pattern: Expr, negated: bool) -> Self {
        Self {
            kind,
            left: Box::new(left),
            pattern: Box::new(pattern),
            negated,
            regex: OnceLock::new(),
        }
    }
}

impl PartialEq for PatternMatch {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.negated == other.negated
            && self.left == other.left
            && self.pattern == other.pattern
    }
}

/// Filter syntax tree
///
/// Immutable after construction apart from the regex slot in `PatternMatch`,
/// which is filled once and shared by every record tested against the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Symbol(String),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Pattern(PatternMatch),
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },
}

impl Expr {
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    #[must_use]
    pub fn compare(op: CompareOp, left: Self, right: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// All symbol names referenced anywhere in the tree, in first-seen order
    #[must_use]
    pub fn symbols(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::Symbol(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Self::Compare { left, right, .. } | Self::Logical { left, right, .. } => {
                left.collect_symbols(out);
                right.collect_symbols(out);
            }
            Self::Not(inner) => inner.collect_symbols(out),
            Self::Pattern(p) => {
                p.left.collect_symbols(out);
                p.pattern.collect_symbols(out);
            }
            Self::Between {
                expr, low, high, ..
            } => {
                expr.collect_symbols(out);
                low.collect_symbols(out);
                high.collect_symbols(out);
            }
            Self::In { expr, values, .. } => {
                expr.collect_symbols(out);
                for v in values {
                    v.collect_symbols(out);
                }
            }
        }
    }

    /// Binding strength used when printing; higher binds tighter
    const fn precedence(&self) -> u8 {
        match self {
            Self::Logical {
                op: LogicalOp::Or, ..
            } => 1,
            Self::Logical {
                op: LogicalOp::And,
                ..
            } => 2,
            Self::Not(_) => 3,
            Self::Compare { .. } | Self::Pattern(_) | Self::Between { .. } | Self::In { .. } => 4,
            Self::Literal(_) | Self::Symbol(_) => 5,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "(")?;
            self.fmt_at(f, 0)?;
            return write!(f, ")");
        }
        match self {
            Self::Literal(value) => fmt_literal(f, value),
            Self::Symbol(name) => write!(f, "{name}"),
            Self::Compare { op, left, right } => {
                left.fmt_at(f, 5)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_at(f, 5)
            }
            Self::Logical { op, left, right } => {
                let own = self.precedence();
                left.fmt_at(f, own)?;
                write!(f, " {} ", op.keyword())?;
                right.fmt_at(f, own + 1)
            }
            Self::Not(inner) => {
                write!(f, "NOT ")?;
                inner.fmt_at(f, 3)
            }
            Self::Pattern(p) => {
                p.left.fmt_at(f, 5)?;
                if p.negated {
                    write!(f, " NOT")?;
                }
                write!(f, " {} ", p.kind.keyword())?;
                p.pattern.fmt_at(f, 5)
            }
            Self::Between {
                expr,
                low,
                high,
                negated,
            } => {
                expr.fmt_at(f, 5)?;
                if *negated {
                    write!(f, " NOT")?;
                }
                write!(f, " BETWEEN ")?;
                low.fmt_at(f, 5)?;
                write!(f, " AND ")?;
                high.fmt_at(f, 5)
            }
            Self::In {
                expr,
                values,
                negated,
            } => {
                expr.fmt_at(f, 5)?;
                if *negated {
                    write!(f, " NOT")?;
                }
                write!(f, " IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    v.fmt_at(f, 5)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn fmt_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Number(n) => write!(f, "{n}"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
    }
}

/// Prints filter text that parses back to an equal tree
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}
