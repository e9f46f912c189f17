use super::ast::CompareOp;
use super::error::EvalError;
use std::cmp::Ordering;
use std::fmt;

/// A scalar produced by a literal, a record field, or an operator
///
/// Sizes are plain numbers of bytes. Comparisons are only defined between two
/// values of the same variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Number(i64),
    Text(String),
    Bool(bool),
}

impl Value {
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Truthiness used by AND/OR/NOT and by the final match decision
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0,
            Self::Text(s) => !s.is_empty(),
            Self::Bool(b) => *b,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Bool(_) => "boolean",
        }
    }

    /// Compare two values with a comparison operator.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::TypeMismatch` when the variants differ and
    /// `EvalError::InvalidOperator` for ordering operators on booleans.
    pub fn compare(&self, op: CompareOp, other: &Self) -> Result<bool, EvalError> {
        let ordering = match (self, other) {
            (Self::Number(l), Self::Number(r)) => l.cmp(r),
            (Self::Text(l), Self::Text(r)) => l.cmp(r),
            (Self::Bool(l), Self::Bool(r)) => match op {
                CompareOp::Eq => return Ok(l == r),
                CompareOp::Ne => return Ok(l != r),
                _ => {
                    return Err(EvalError::InvalidOperator {
                        op: op.symbol(),
                        kind: "boolean",
                    });
                }
            },
            _ => {
                return Err(EvalError::TypeMismatch {
                    op: op.symbol(),
                    left: self.kind(),
                    right: other.kind(),
                });
            }
        };
        Ok(op.holds(ordering))
    }

    /// Ordering between two values of the same number or text variant
    #[must_use]
    pub fn partial_order(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(l), Self::Number(r)) => Some(l.cmp(r)),
            (Self::Text(l), Self::Text(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Whether two values are equal and of the same variant
    #[must_use]
    pub fn same_kind_eq(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Number(l), Self::Number(r)) => Some(l == r),
            (Self::Text(l), Self::Text(r)) => Some(l == r),
            (Self::Bool(l), Self::Bool(r)) => Some(l == r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
