use super::ast::{Expr, LogicalOp, PatternMatch};
use super::error::{EvalError, ParseError};
use super::parser::parse;
use super::value::Value;
use std::fmt;

/// Anything that can answer symbol lookups during evaluation
///
/// Returns `None` for names the source does not know, which the evaluator
/// reports as `EvalError::UnknownSymbol`.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<Value>;
}

impl<F> FieldSource for F
where
    F: Fn(&str) -> Option<Value>,
{
    fn field(&self, name: &str) -> Option<Value> {
        self(name)
    }
}

/// A compiled filter, ready to be tested against many records
///
/// Literal LIKE/ILIKE/RLIKE patterns are compiled once here. A filter whose root
/// is a truthy literal (`1`, `true`, an empty structured group) takes a fast
/// path and never touches the record.
#[derive(Debug, Clone)]
pub struct FilterExpression {
    expr: Expr,
    accept_all: bool,
}

impl FilterExpression {
    /// Compile filter text.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the text is malformed or contains an invalid
    /// literal pattern.
    pub fn compile(text: &str) -> Result<Self, ParseError> {
        Self::from_expr(parse(text)?)
    }

    /// Compile an already-built expression tree.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidRegex` if a literal pattern does not compile.
    pub fn from_expr(expr: Expr) -> Result<Self, ParseError> {
        prepare_patterns(&expr)?;
        let accept_all = matches!(&expr, Expr::Literal(value) if value.truthy());
        Ok(Self { expr, accept_all })
    }

    /// Filter that accepts every record
    #[must_use]
    pub fn accept_all() -> Self {
        Self {
            expr: Expr::Literal(Value::Bool(true)),
            accept_all: true,
        }
    }

    #[must_use]
    pub const fn is_accept_all(&self) -> bool {
        self.accept_all
    }

    #[must_use]
    pub const fn expr(&self) -> &Expr {
        &self.expr
    }

    #[must_use]
    pub fn symbols(&self) -> Vec<&str> {
        self.expr.symbols()
    }

    /// Test one record.
    ///
    /// # Errors
    ///
    /// Returns `EvalError` when the record lacks a referenced field or operand
    /// kinds do not fit an operator. The caller decides whether that counts as
    /// a non-match.
    pub fn test(&self, record: &dyn FieldSource) -> Result<bool, EvalError> {
        if self.accept_all {
            return Ok(true);
        }
        Ok(eval(&self.expr, record)?.truthy())
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

fn prepare_patterns(expr: &Expr) -> Result<(), ParseError> {
    match expr {
        Expr::Literal(_) | Expr::Symbol(_) => Ok(()),
        Expr::Compare { left, right, .. } | Expr::Logical { left, right, .. } => {
            prepare_patterns(left)?;
            prepare_patterns(right)
        }
        Expr::Not(inner) => prepare_patterns(inner),
        Expr::Pattern(p) => {
            prepare_patterns(&p.left)?;
            if let Expr::Literal(Value::Text(pattern)) = p.pattern.as_ref()
                && p.regex.get().is_none()
            {
                let regex = p.kind.build_regex(pattern).map_err(ParseError::InvalidRegex)?;
                let _ = p.regex.set(regex);
            }
            Ok(())
        }
        Expr::Between { expr, low, high, .. } => {
            prepare_patterns(expr)?;
            prepare_patterns(low)?;
            prepare_patterns(high)
        }
        Expr::In { expr, values, .. } => {
            prepare_patterns(expr)?;
            values.iter().try_for_each(prepare_patterns)
        }
    }
}

fn eval(expr: &Expr, record: &dyn FieldSource) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Symbol(name) => record
            .field(name)
            .ok_or_else(|| EvalError::UnknownSymbol(name.clone())),
        Expr::Compare { op, left, right } => {
            let l = eval(left, record)?;
            let r = eval(right, record)?;
            Ok(Value::Bool(l.compare(*op, &r)?))
        }
        Expr::Logical { op, left, right } => {
            let l = eval(left, record)?.truthy();
            let result = match op {
                LogicalOp::And => l && eval(right, record)?.truthy(),
                LogicalOp::Or => l || eval(right, record)?.truthy(),
            };
            Ok(Value::Bool(result))
        }
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, record)?.truthy())),
        Expr::Pattern(p) => eval_pattern(p, record).map(Value::Bool),
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let v = eval(expr, record)?;
            let lo = eval(low, record)?;
            let hi = eval(high, record)?;
            match (lo.partial_order(&v), v.partial_order(&hi)) {
                (Some(a), Some(b)) => Ok(Value::Bool((a.is_le() && b.is_le()) != *negated)),
                _ => Err(EvalError::TypeMismatch {
                    op: "BETWEEN",
                    left: v.kind(),
                    right: if lo.kind() == v.kind() { hi.kind() } else { lo.kind() },
                }),
            }
        }
        Expr::In {
            expr,
            values,
            negated,
        } => {
            let v = eval(expr, record)?;
            let mut found = false;
            for candidate in values {
                if v.same_kind_eq(&eval(candidate, record)?) == Some(true) {
                    found = true;
                    break;
                }
            }
            Ok(Value::Bool(found != *negated))
        }
    }
}

fn eval_pattern(p: &PatternMatch, record: &dyn FieldSource) -> Result<bool, EvalError> {
    let Value::Text(text) = eval(&p.left, record)? else {
        return Err(EvalError::InvalidOperator {
            op: p.kind.keyword(),
            kind: "non-text",
        });
    };
    let matched = if let Some(regex) = p.regex.get() {
        regex.is_match(&text)
    } else {
        let Value::Text(pattern) = eval(&p.pattern, record)? else {
            return Err(EvalError::InvalidOperator {
                op: p.kind.keyword(),
                kind: "non-text",
            });
        };
        p.kind
            .build_regex(&pattern)
            .map_err(EvalError::InvalidRegex)?
            .is_match(&text)
    };
    Ok(matched != p.negated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fields(HashMap<&'static str, Value>);

    impl FieldSource for Fields {
        fn field(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    fn record() -> Fields {
        Fields(HashMap::from([
            ("name", Value::text("holiday.JPG")),
            ("ext", Value::text("jpg")),
            ("size", Value::Number(2000)),
            ("archive", Value::text("")),
            ("date", Value::text("2024-05-01")),
            ("today", Value::text("2024-05-03")),
        ]))
    }

    fn matches(filter: &str) -> bool {
        FilterExpression::compile(filter)
            .unwrap()
            .test(&record())
            .unwrap()
    }

    #[test]
    fn test_comparisons() {
        assert!(matches("size > 1K"));
        assert!(matches("size = 2000"));
        assert!(matches("ext = 'jpg'"));
        assert!(!matches("ext <> 'jpg'"));
        assert!(matches("date < today"));
    }

    #[test]
    fn test_between() {
        assert!(matches("size between 1K and 10K"));
        assert!(!matches("size not between 1K and 10K"));
        assert!(matches("date between '2024-01-01' and '2024-12-31'"));
    }

    #[test]
    fn test_between_bounds_inclusive() {
        assert!(matches("size between 2000 and 2000"));
    }

    #[test]
    fn test_in_skips_mismatched_kinds() {
        assert!(matches("ext in (1, 'png', 'jpg')"));
        assert!(matches("ext not in ('png', 'gif')"));
        assert!(!matches("size in ('2000')"));
    }

    #[test]
    fn test_like_family() {
        assert!(matches("name like 'holiday.%'"));
        assert!(!matches("name like '%.jpg'"));
        assert!(matches("name ilike '%.jpg'"));
        assert!(matches("name not like 'x%'"));
        assert!(matches("name rlike 'day\\.'"));
        assert!(matches("name like 'holiday___G'"));
    }

    #[test]
    fn test_like_with_symbol_pattern() {
        let f = FilterExpression::compile("date like today").unwrap();
        assert!(!f.test(&record()).unwrap());
    }

    #[test]
    fn test_logic_short_circuit_skips_unknown_symbol() {
        assert!(!matches("size > 1M and nosuch = 1"));
        assert!(matches("size > 1K or nosuch = 1"));
    }

    #[test]
    fn test_truthiness() {
        assert!(!matches("archive"));
        assert!(matches("not archive"));
        assert!(matches("size"));
    }

    #[test]
    fn test_unknown_symbol_is_eval_error() {
        let f = FilterExpression::compile("colour = 'red'").unwrap();
        assert_eq!(
            f.test(&record()),
            Err(EvalError::UnknownSymbol("colour".to_string()))
        );
    }

    #[test]
    fn test_type_mismatch_is_eval_error() {
        let f = FilterExpression::compile("size = 'big'").unwrap();
        assert!(matches!(f.test(&record()), Err(EvalError::TypeMismatch { .. })));
        let f = FilterExpression::compile("size between 'a' and 'b'").unwrap();
        assert!(matches!(f.test(&record()), Err(EvalError::TypeMismatch { .. })));
        let f = FilterExpression::compile("size like '2%'").unwrap();
        assert!(matches!(f.test(&record()), Err(EvalError::InvalidOperator { .. })));
    }

    #[test]
    fn test_accept_all_fast_path() {
        let f = FilterExpression::compile("1").unwrap();
        assert!(f.is_accept_all());
        let empty = |_: &str| -> Option<Value> { None };
        assert!(f.test(&empty).unwrap());
        assert!(FilterExpression::compile("true").unwrap().is_accept_all());
        assert!(!FilterExpression::compile("0").unwrap().is_accept_all());
        assert!(!FilterExpression::compile("size > 0").unwrap().is_accept_all());
    }

    #[test]
    fn test_invalid_literal_regex_is_parse_error() {
        assert!(matches!(
            FilterExpression::compile("name rlike '('"),
            Err(ParseError::InvalidRegex(_))
        ));
    }

    #[test]
    fn test_regex_compiled_once() {
        let f = FilterExpression::compile("name like '%.JPG'").unwrap();
        let Expr::Pattern(p) = f.expr() else {
            panic!("expected pattern");
        };
        assert!(p.regex.get().is_some());
        for _ in 0..3 {
            assert!(f.test(&record()).unwrap());
        }
    }

    #[test]
    fn test_closure_field_source() {
        let f = FilterExpression::compile("n >= 3").unwrap();
        let source = |name: &str| (name == "n").then_some(Value::Number(3));
        assert!(f.test(&source).unwrap());
    }
}
