//! Filter-specific error types
//!
//! Two families of failure exist for filters:
//!
//! - **`ParseError`**: the filter text or structured document is malformed. This
//!   is fatal to the compile call and no partial expression is returned.
//! - **`EvalError`**: a compiled filter could not be evaluated against one
//!   record (unknown symbol, type mismatch). It is reported per record and never
//!   aborts a search.

use thiserror::Error;

/// Errors raised while compiling filter text or a structured filter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A character that cannot start any token
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    /// A quoted string without its closing quote
    #[error("Unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },

    /// A token that does not fit the grammar at this point
    #[error("Unexpected '{found}' at position {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        pos: usize,
        expected: &'static str,
    },

    /// Input ended while more tokens were required
    #[error("Unexpected end of filter, expected {0}")]
    UnexpectedEnd(&'static str),

    /// A numeric literal that does not fit in 64 bits
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// A size literal such as `10Q`
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// A LIKE/RLIKE pattern that does not compile
    #[error("Invalid pattern: {0}")]
    InvalidRegex(String),

    /// Structured input that is not valid JSON
    #[error("Invalid JSON filter: {0}")]
    InvalidJson(String),

    /// Structured input with the wrong shape
    #[error("Invalid filter structure: {0}")]
    InvalidStructure(String),

    /// An operator name the structured form does not know
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// A symbol that is not allowed in this context
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// An expression with no structured equivalent
    #[error("Expression cannot be represented as a structured filter: {0}")]
    NotRepresentable(String),
}

/// Errors raised while testing a compiled filter against one record
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The record has no field with this name
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Two operands of different kinds were compared
    #[error("Type mismatch in {op}: {left} vs {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// The operator is not defined for this kind of value
    #[error("Operator {op} is not valid for {kind} values")]
    InvalidOperator { op: &'static str, kind: &'static str },

    /// A pattern computed at evaluation time failed to compile
    #[error("Invalid pattern: {0}")]
    InvalidRegex(String),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
