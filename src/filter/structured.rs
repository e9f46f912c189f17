//! Structured (JSON-shaped) filters
//!
//! A node is either a condition or a group:
//!
//! ```json
//! { "field": "size", "op": ">", "value": "10M" }
//! { "op": "or", "conditions": [ ... ], "negated": true }
//! ```
//!
//! A top-level array is an AND group. String values are coerced the same way a
//! user typing them would expect: size-shaped strings (and any string compared
//! against `size`) become byte counts, `today` and `mo`..`su` become field
//! references, and `null` becomes empty text. The object forms
//! `{"field": "name"}` and `{"text": "10K"}` force a field reference or a plain
//! text value. Export uses them whenever a bare string would read back as
//! something else, so text -> structured -> text keeps the same tree.

use super::ast::{CompareOp, Expr, LogicalOp, PatternKind, PatternMatch};
use super::error::ParseError;
use super::size::{is_unit_char, parse_size};
use super::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue, json};
use std::fmt;
use std::str::FromStr;

const CALENDAR_SYMBOLS: [&str; 8] = ["today", "mo", "tu", "we", "th", "fr", "sa", "su"];

/// Operator of a structured condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    Compare(CompareOp),
    Pattern { kind: PatternKind, negated: bool },
    Between { negated: bool },
    In { negated: bool },
}

impl ConditionOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Compare(op) => op.symbol(),
            Self::Pattern { kind, negated } => match (kind, negated) {
                (PatternKind::Like, false) => "like",
                (PatternKind::Ilike, false) => "ilike",
                (PatternKind::Rlike, false) => "rlike",
                (PatternKind::Like, true) => "not_like",
                (PatternKind::Ilike, true) => "not_ilike",
                (PatternKind::Rlike, true) => "not_rlike",
            },
            Self::Between { negated: false } => "between",
            Self::Between { negated: true } => "not_between",
            Self::In { negated: false } => "in",
            Self::In { negated: true } => "not_in",
        }
    }
}

impl FromStr for ConditionOp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(op) = CompareOp::from_symbol(s) {
            return Ok(Self::Compare(op));
        }
        let lower = s.to_ascii_lowercase();
        let (negated, base) = match lower.strip_prefix("not_") {
            Some(rest) => (true, rest),
            None => (false, lower.as_str()),
        };
        let op = match base {
            "like" => Self::Pattern {
                kind: PatternKind::Like,
                negated,
            },
            "ilike" => Self::Pattern {
                kind: PatternKind::Ilike,
                negated,
            },
            "rlike" => Self::Pattern {
                kind: PatternKind::Rlike,
                negated,
            },
            "between" => Self::Between { negated },
            "in" => Self::In { negated },
            _ => return Err(ParseError::UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Value(Value),
    Field(String),
}

impl Operand {
    fn to_expr(&self) -> Expr {
        match self {
            Self::Value(v) => Expr::Literal(v.clone()),
            Self::Field(name) => Expr::Symbol(name.clone()),
        }
    }
}

/// A single `field op value` test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    /// One operand for comparisons and patterns, two for BETWEEN, one or more
    /// for IN
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGroup {
    pub op: LogicalOp,
    pub conditions: Vec<StructuredFilter>,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredFilter {
    Condition(Condition),
    Group(FilterGroup),
}

impl StructuredFilter {
    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidJson` for malformed JSON and
    /// `InvalidStructure`/`UnknownOperator` for documents of the wrong shape.
    pub fn from_json(text: &str) -> Result<Self, ParseError> {
        let value: JsonValue =
            serde_json::from_str(text).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Build from an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Same as [`StructuredFilter::from_json`] minus JSON syntax errors.
    pub fn from_value(value: &JsonValue) -> Result<Self, ParseError> {
        match value {
            JsonValue::Array(items) => Ok(Self::Group(FilterGroup {
                op: LogicalOp::And,
                conditions: items.iter().map(parse_node).collect::<Result<_, _>>()?,
                negated: false,
            })),
            other => parse_node(other),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Group(group) => {
                let mut map = Map::new();
                let op = match group.op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                map.insert("op".into(), json!(op));
                map.insert(
                    "conditions".into(),
                    JsonValue::Array(group.conditions.iter().map(Self::to_json).collect()),
                );
                if group.negated {
                    map.insert("negated".into(), json!(true));
                }
                JsonValue::Object(map)
            }
            Self::Condition(cond) => {
                let mut map = Map::new();
                map.insert("field".into(), json!(cond.field));
                map.insert("op".into(), json!(cond.op.name()));
                let export = |operand: &Operand| export_operand(&cond.field, operand);
                match cond.op {
                    ConditionOp::In { .. } => {
                        map.insert(
                            "value".into(),
                            JsonValue::Array(cond.operands.iter().map(export).collect()),
                        );
                    }
                    ConditionOp::Between { .. } => {
                        if let [low, high] = cond.operands.as_slice() {
                            map.insert("value".into(), export(low));
                            map.insert("value_end".into(), export(high));
                        }
                    }
                    _ => {
                        if let Some(operand) = cond.operands.first() {
                            map.insert("value".into(), export(operand));
                        }
                    }
                }
                JsonValue::Object(map)
            }
        }
    }

    /// Lower to the expression tree shared with the text language
    #[must_use]
    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Condition(cond) => condition_to_expr(cond),
            Self::Group(group) => {
                let mut parts = group.conditions.iter().map(Self::to_expr);
                let joined = match parts.next() {
                    None => Expr::Literal(Value::Bool(true)),
                    Some(first) => parts.fold(first, |left, right| Expr::Logical {
                        op: group.op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
                };
                if group.negated {
                    Expr::not(joined)
                } else {
                    joined
                }
            }
        }
    }

    /// Convert an expression tree to structured form.
    ///
    /// Chains of the same logical operator become one flat group. A bare
    /// literal becomes an empty group (negated if the literal is falsy).
    ///
    /// # Errors
    ///
    /// Returns `ParseError::NotRepresentable` for trees whose predicates do not
    /// have a field on the left and a literal or field on the right, and for
    /// bare field references.
    pub fn from_expr(expr: &Expr) -> Result<Self, ParseError> {
        match expr {
            Expr::Literal(value) => Ok(Self::Group(FilterGroup {
                op: LogicalOp::And,
                conditions: Vec::new(),
                negated: !value.truthy(),
            })),
            Expr::Symbol(name) => Err(ParseError::NotRepresentable(name.clone())),
            Expr::Logical { op, .. } => {
                let mut spine = Vec::new();
                collect_left_spine(expr, *op, &mut spine);
                Ok(Self::Group(FilterGroup {
                    op: *op,
                    conditions: spine
                        .into_iter()
                        .map(Self::from_expr)
                        .collect::<Result<_, _>>()?,
                    negated: false,
                }))
            }
            Expr::Not(inner) => match Self::from_expr(inner)? {
                Self::Group(group) if !group.negated => Ok(Self::Group(FilterGroup {
                    negated: true,
                    ..group
                })),
                other => Ok(Self::Group(FilterGroup {
                    op: LogicalOp::And,
                    conditions: vec![other],
                    negated: true,
                })),
            },
            Expr::Compare { op, left, right } => Ok(Self::Condition(Condition {
                field: field_of(left, expr)?,
                op: ConditionOp::Compare(*op),
                operands: vec![operand_of(right, expr)?],
            })),
            Expr::Pattern(p) => Ok(Self::Condition(Condition {
                field: field_of(&p.left, expr)?,
                op: ConditionOp::Pattern {
                    kind: p.kind,
                    negated: p.negated,
                },
                operands: vec![operand_of(&p.pattern, expr)?],
            })),
            Expr::Between {
                expr: target,
                low,
                high,
                negated,
            } => Ok(Self::Condition(Condition {
                field: field_of(target, expr)?,
                op: ConditionOp::Between { negated: *negated },
                operands: vec![operand_of(low, expr)?, operand_of(high, expr)?],
            })),
            Expr::In {
                expr: target,
                values,
                negated,
            } => Ok(Self::Condition(Condition {
                field: field_of(target, expr)?,
                op: ConditionOp::In { negated: *negated },
                operands: values
                    .iter()
                    .map(|v| operand_of(v, expr))
                    .collect::<Result<_, _>>()?,
            })),
        }
    }
}

/// Renders as filter text
impl fmt::Display for StructuredFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

impl Serialize for StructuredFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StructuredFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn collect_left_spine<'a>(expr: &'a Expr, op: LogicalOp, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Logical {
            op: inner,
            left,
            right,
        } if *inner == op => {
            collect_left_spine(left, op, out);
            out.push(right);
        }
        other => out.push(other),
    }
}

fn field_of(expr: &Expr, whole: &Expr) -> Result<String, ParseError> {
    match expr {
        Expr::Symbol(name) => Ok(name.clone()),
        _ => Err(ParseError::NotRepresentable(whole.to_string())),
    }
}

fn operand_of(expr: &Expr, whole: &Expr) -> Result<Operand, ParseError> {
    match expr {
        Expr::Literal(v) => Ok(Operand::Value(v.clone())),
        Expr::Symbol(name) => Ok(Operand::Field(name.clone())),
        _ => Err(ParseError::NotRepresentable(whole.to_string())),
    }
}

fn condition_to_expr(cond: &Condition) -> Expr {
    let field = Expr::Symbol(cond.field.clone());
    let operand = |i: usize| {
        cond.operands
            .get(i)
            .map_or(Expr::Literal(Value::text("")), Operand::to_expr)
    };
    match cond.op {
        ConditionOp::Compare(op) => Expr::compare(op, field, operand(0)),
        ConditionOp::Pattern { kind, negated } => {
            Expr::Pattern(PatternMatch::new(kind, field, operand(0), negated))
        }
        ConditionOp::Between { negated } => Expr::Between {
            expr: Box::new(field),
            low: Box::new(operand(0)),
            high: Box::new(operand(1)),
            negated,
        },
        ConditionOp::In { negated } => Expr::In {
            expr: Box::new(field),
            values: cond.operands.iter().map(Operand::to_expr).collect(),
            negated,
        },
    }
}

fn parse_node(node: &JsonValue) -> Result<StructuredFilter, ParseError> {
    let JsonValue::Object(map) = node else {
        return Err(ParseError::InvalidStructure(format!(
            "expected an object, found {node}"
        )));
    };

    if let Some(conditions) = map.get("conditions") {
        let JsonValue::Array(items) = conditions else {
            return Err(ParseError::InvalidStructure(
                "'conditions' must be an array".into(),
            ));
        };
        let op = match map.get("op") {
            None => LogicalOp::And,
            Some(JsonValue::String(s)) if s.eq_ignore_ascii_case("and") => LogicalOp::And,
            Some(JsonValue::String(s)) if s.eq_ignore_ascii_case("or") => LogicalOp::Or,
            Some(other) => return Err(ParseError::UnknownOperator(json_text(other))),
        };
        let negated = match map.get("negated") {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::Bool(b)) => *b,
            Some(_) => {
                return Err(ParseError::InvalidStructure(
                    "'negated' must be a boolean".into(),
                ));
            }
        };
        return Ok(StructuredFilter::Group(FilterGroup {
            op,
            conditions: items.iter().map(parse_node).collect::<Result<_, _>>()?,
            negated,
        }));
    }

    if let Some(field) = map.get("field") {
        return parse_condition(field, map).map(StructuredFilter::Condition);
    }

    Err(ParseError::InvalidStructure(format!(
        "node has neither 'field' nor 'conditions': {node}"
    )))
}

fn parse_condition(field: &JsonValue, map: &Map<String, JsonValue>) -> Result<Condition, ParseError> {
    let field = match field {
        JsonValue::String(s) if is_identifier(s) => s.clone(),
        other => {
            return Err(ParseError::InvalidStructure(format!(
                "invalid field name {other}"
            )));
        }
    };
    let op: ConditionOp = match map.get("op") {
        None => ConditionOp::Compare(CompareOp::Eq),
        Some(JsonValue::String(s)) => s.parse()?,
        Some(other) => return Err(ParseError::UnknownOperator(json_text(other))),
    };
    let value = map.get("value").unwrap_or(&JsonValue::Null);

    let operands = match op {
        ConditionOp::In { .. } => {
            let items = match value {
                JsonValue::Array(items) => items.iter().map(|v| coerce(&field, v)).collect::<Result<Vec<_>, _>>()?,
                single => vec![coerce(&field, single)?],
            };
            if items.is_empty() {
                return Err(ParseError::InvalidStructure(format!(
                    "'{}' needs at least one value",
                    op.name()
                )));
            }
            items
        }
        ConditionOp::Between { .. } => match (map.get("value_end"), value) {
            (Some(end), start) if !end.is_null() => vec![coerce(&field, start)?, coerce(&field, end)?],
            (_, JsonValue::Array(items)) if items.len() == 2 => {
                vec![coerce(&field, &items[0])?, coerce(&field, &items[1])?]
            }
            _ => {
                return Err(ParseError::InvalidStructure(format!(
                    "'{}' needs 'value_end' or a two-element 'value' array",
                    op.name()
                )));
            }
        },
        _ => vec![coerce(&field, value)?],
    };

    Ok(Condition {
        field,
        op,
        operands,
    })
}

fn coerce(field: &str, value: &JsonValue) -> Result<Operand, ParseError> {
    match value {
        JsonValue::Null => Ok(Operand::Value(Value::text(""))),
        JsonValue::Bool(b) => Ok(Operand::Value(Value::Bool(*b))),
        JsonValue::Number(n) => {
            let number = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.abs() < i64::MAX as f64).map(|f| f as i64))
                .ok_or_else(|| ParseError::InvalidNumber(n.to_string()))?;
            Ok(Operand::Value(Value::Number(number)))
        }
        JsonValue::String(s) => Ok(coerce_str(field, s)),
        JsonValue::Object(obj) if obj.len() == 1 => match obj.iter().next() {
            Some((key, JsonValue::String(name))) if key == "field" && is_identifier(name) => {
                Ok(Operand::Field(name.clone()))
            }
            Some((key, JsonValue::String(text))) if key == "text" => {
                Ok(Operand::Value(Value::Text(text.clone())))
            }
            _ => Err(ParseError::InvalidStructure(format!("invalid value {value}"))),
        },
        JsonValue::Array(_) | JsonValue::Object(_) => {
            Err(ParseError::InvalidStructure(format!("invalid value {value}")))
        }
    }
}

fn coerce_str(field: &str, s: &str) -> Operand {
    if (field == "size" || looks_like_size(s))
        && let Some(bytes) = parse_size(s)
    {
        return Operand::Value(Value::Number(bytes));
    }
    let lower = s.to_ascii_lowercase();
    if CALENDAR_SYMBOLS.contains(&lower.as_str()) {
        return Operand::Field(lower);
    }
    Operand::Value(Value::text(s))
}

fn looks_like_size(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next_back() {
        Some(unit) if is_unit_char(unit) => {
            let digits = chars.as_str();
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        }
        _ => false,
    }
}

fn export_operand(field: &str, operand: &Operand) -> JsonValue {
    match operand {
        Operand::Value(Value::Number(n)) => json!(n),
        Operand::Value(Value::Bool(b)) => json!(b),
        Operand::Value(Value::Text(s)) => {
            if coerce_str(field, s) == *operand {
                json!(s)
            } else {
                json!({ "text": s })
            }
        }
        Operand::Field(name) => {
            if coerce_str(field, name) == *operand {
                json!(name)
            } else {
                json!({ "field": name })
            }
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
