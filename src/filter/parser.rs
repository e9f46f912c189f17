//! Recursive-descent parser for filter text
//!
//! Grammar, lowest to highest precedence:
//!
//! ```text
//! or        := and ( OR and )*
//! and       := not ( AND not )*
//! not       := NOT not | predicate
//! predicate := primary [ cmp primary
//!                      | [NOT] (LIKE | ILIKE | RLIKE) primary
//!                      | [NOT] BETWEEN primary AND primary
//!                      | [NOT] IN '(' primary ( ',' primary )* ')' ]
//! primary   := number | text | TRUE | FALSE | ident | '(' or ')'
//! ```

use super::ast::{Expr, LogicalOp, PatternKind, PatternMatch};
use super::error::ParseError;
use super::lexer::{Token, TokenKind, tokenize};
use super::value::Value;

/// Parse filter text into an expression tree
///
/// # Errors
///
/// Returns `ParseError` on lexical errors, grammar violations, trailing tokens
/// or empty input.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ParseError::UnexpectedToken {
            found: token.kind.to_string(),
            pos: token.pos,
            expected: "end of filter",
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn next(&mut self, expected: &'static str) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ParseError::UnexpectedEnd(expected))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<(), ParseError> {
        let token = self.next(expected)?;
        if &token.kind == kind {
            Ok(())
        } else {
            Err(unexpected(&token, expected))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Not) {
            return Ok(Expr::not(self.parse_not()?));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_primary()?;

        let negated = self.peek_kind() == Some(&TokenKind::Not)
            && matches!(
                self.peek_kind_at(1),
                Some(TokenKind::Like | TokenKind::Ilike | TokenKind::Rlike | TokenKind::Between | TokenKind::In)
            );
        if negated {
            self.pos += 1;
        }

        match self.peek_kind() {
            Some(TokenKind::Compare(op)) if !negated => {
                let op = *op;
                self.pos += 1;
                let right = self.parse_primary()?;
                Ok(Expr::compare(op, left, right))
            }
            Some(TokenKind::Like | TokenKind::Ilike | TokenKind::Rlike) => {
                let kind = match self.next("a pattern operator")?.kind {
                    TokenKind::Like => PatternKind::Like,
                    TokenKind::Ilike => PatternKind::Ilike,
                    _ => PatternKind::Rlike,
                };
                let pattern = self.parse_primary()?;
                Ok(Expr::Pattern(PatternMatch::new(kind, left, pattern, negated)))
            }
            Some(TokenKind::Between) => {
                self.pos += 1;
                let low = self.parse_primary()?;
                self.expect(&TokenKind::And, "AND in BETWEEN")?;
                let high = self.parse_primary()?;
                Ok(Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                })
            }
            Some(TokenKind::In) => {
                self.pos += 1;
                self.expect(&TokenKind::LParen, "'(' after IN")?;
                let mut values = vec![self.parse_primary()?];
                while self.eat(&TokenKind::Comma) {
                    values.push(self.parse_primary()?);
                }
                self.expect(&TokenKind::RParen, "')' closing IN list")?;
                Ok(Expr::In {
                    expr: Box::new(left),
                    values,
                    negated,
                })
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.next("an operand")?;
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            TokenKind::Text(s) => Ok(Expr::Literal(Value::Text(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Ident(name) => Ok(Expr::Symbol(name)),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(unexpected(&token, "an operand")),
        }
    }
}

fn unexpected(token: &Token, expected: &'static str) -> ParseError {
    ParseError::UnexpectedToken {
        found: token.kind.to_string(),
        pos: token.pos,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ast::CompareOp;

    #[test]
    fn test_parse_comparison() {
        let expr = parse("size > 10").unwrap();
        assert_eq!(
            expr,
            Expr::compare(CompareOp::Gt, Expr::symbol("size"), Expr::literal(10))
        );
    }

    #[test]
    fn test_parse_precedence_and_over_or() {
        let expr = parse("a OR b AND c").unwrap();
        assert_eq!(
            expr,
            Expr::or(
                Expr::symbol("a"),
                Expr::and(Expr::symbol("b"), Expr::symbol("c"))
            )
        );
    }

    #[test]
    fn test_parse_not_binds_tighter_than_and() {
        let expr = parse("NOT a AND b").unwrap();
        assert_eq!(
            expr,
            Expr::and(Expr::not(Expr::symbol("a")), Expr::symbol("b"))
        );
    }

    #[test]
    fn test_parse_parentheses() {
        let expr = parse("(a OR b) AND c").unwrap();
        assert_eq!(
            expr,
            Expr::and(
                Expr::or(Expr::symbol("a"), Expr::symbol("b")),
                Expr::symbol("c")
            )
        );
    }

    #[test]
    fn test_parse_not_like() {
        let expr = parse("name NOT ILIKE '%.JPG'").unwrap();
        let Expr::Pattern(p) = expr else {
            panic!("expected pattern");
        };
        assert!(p.negated);
        assert_eq!(p.kind, PatternKind::Ilike);
        assert_eq!(*p.pattern, Expr::literal("%.JPG"));
    }

    #[test]
    fn test_parse_between() {
        let expr = parse("size between 1K and 10K").unwrap();
        assert_eq!(
            expr,
            Expr::Between {
                expr: Box::new(Expr::symbol("size")),
                low: Box::new(Expr::literal(1024)),
                high: Box::new(Expr::literal(10240)),
                negated: false,
            }
        );
    }

    #[test]
    fn test_parse_between_inside_and() {
        let expr = parse("size BETWEEN 1 AND 2 AND ext = 'a'").unwrap();
        assert!(matches!(
            expr,
            Expr::Logical {
                op: LogicalOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_not_in() {
        let expr = parse("ext NOT IN ('jpg', 'png')").unwrap();
        let Expr::In { values, negated, .. } = expr else {
            panic!("expected IN");
        };
        assert!(negated);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_parse_literal_only() {
        assert_eq!(parse("1").unwrap(), Expr::literal(1));
        assert_eq!(parse("TRUE").unwrap(), Expr::literal(true));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse(""), Err(ParseError::UnexpectedEnd(_))));
        assert!(matches!(parse("a ="), Err(ParseError::UnexpectedEnd(_))));
        assert!(matches!(
            parse("a = 1 b"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse("(a = 1"),
            Err(ParseError::UnexpectedEnd(_))
        ));
        assert!(matches!(
            parse("a IN 1"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(parse("size BETWEEN 1 OR 2").is_err());
    }

    #[test]
    fn test_display_reparses_to_same_tree() {
        let sources = [
            "size > 1K AND (ext = 'jpg' OR ext = 'png')",
            "NOT name LIKE 'a%' OR archive <> ''",
            "size NOT BETWEEN 1 AND 100",
            "ext IN ('a', 'b', \"c'd\")",
            "a AND (b AND c)",
            "NOT (a OR b)",
            "date >= mo AND type = 'file'",
            "name = 'a''b\"c'",
            r#"name LIKE "it's ""quoted""%""#,
        ];
        for source in sources {
            let expr = parse(source).unwrap();
            let printed = expr.to_string();
            assert_eq!(parse(&printed).unwrap(), expr, "{source} -> {printed}");
        }
    }
}
