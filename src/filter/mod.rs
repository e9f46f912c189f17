//! Filter language
//!
//! Filters are written either as SQL-like text
//! (`size > 10M and ext in ('zip', 'rar')`) or as a structured JSON document.
//! Both lower to the same [`Expr`] tree and are evaluated by
//! [`FilterExpression`] against anything implementing [`FieldSource`].

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod presets;
pub mod size;
pub mod structured;
pub mod value;

pub use ast::{CompareOp, Expr, LogicalOp, PatternKind};
pub use error::{EvalError, ParseError};
pub use evaluator::{FieldSource, FilterExpression};
pub use parser::parse;
pub use size::{format_size, parse_size};
pub use structured::StructuredFilter;
pub use value::Value;

/// The three ways a filter can be written
#[derive(Debug, Clone, PartialEq)]
pub enum FilterInput {
    /// A preset name such as `images`
    Preset(&'static str),
    /// A JSON document
    Structured(serde_json::Value),
    /// Filter text
    Text(String),
}

impl FilterInput {
    /// Classify user input.
    ///
    /// Preset names win, then anything starting with `{` or `[` that parses as
    /// JSON. Everything else, including JSON-looking text that does not parse,
    /// is filter text.
    #[must_use]
    pub fn detect(input: &str) -> Self {
        let trimmed = input.trim();
        if let Some(name) = presets::names()
            .into_iter()
            .find(|name| name.eq_ignore_ascii_case(trimmed))
        {
            return Self::Preset(name);
        }
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed)
        {
            return Self::Structured(json);
        }
        Self::Text(input.to_string())
    }

    /// Lower to an expression tree.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when the text or document is malformed.
    pub fn to_expr(&self) -> Result<Expr, ParseError> {
        match self {
            Self::Preset(name) => presets::get(name)
                .map(|filter| filter.to_expr())
                .ok_or_else(|| ParseError::UnknownSymbol((*name).to_string())),
            Self::Structured(json) => Ok(StructuredFilter::from_value(json)?.to_expr()),
            Self::Text(text) => parse(text),
        }
    }

    /// Compile to an evaluator.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when the input is malformed.
    pub fn compile(&self) -> Result<FilterExpression, ParseError> {
        FilterExpression::from_expr(self.to_expr()?)
    }
}

/// Detect the input kind and compile it
///
/// # Errors
///
/// Returns `ParseError` when the input is malformed.
pub fn compile_input(input: &str) -> Result<FilterExpression, ParseError> {
    FilterInput::detect(input).compile()
}
