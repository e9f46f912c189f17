use super::ast::CompareOp;
use super::error::ParseError;
use super::size::{is_unit_char, parse_size};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Number(i64),
    Text(String),
    Ident(String),
    Compare(CompareOp),
    And,
    Or,
    Not,
    Like,
    Ilike,
    Rlike,
    Between,
    In,
    True,
    False,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Ident(s) => write!(f, "{s}"),
            Self::Compare(op) => write!(f, "{}", op.symbol()),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Not => write!(f, "NOT"),
            Self::Like => write!(f, "LIKE"),
            Self::Ilike => write!(f, "ILIKE"),
            Self::Rlike => write!(f, "RLIKE"),
            Self::Between => write!(f, "BETWEEN"),
            Self::In => write!(f, "IN"),
            Self::True => write!(f, "TRUE"),
            Self::False => write!(f, "FALSE"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Comma => write!(f, ","),
        }
    }
}

/// A token and the character offset where it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word.to_ascii_uppercase().as_str() {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "LIKE" => TokenKind::Like,
        "ILIKE" => TokenKind::Ilike,
        "RLIKE" => TokenKind::Rlike,
        "BETWEEN" => TokenKind::Between,
        "IN" => TokenKind::In,
        "TRUE" => TokenKind::True,
        "FALSE" => TokenKind::False,
        _ => return None,
    };
    Some(kind)
}

/// Split filter text into tokens
///
/// Keywords are case-insensitive. Strings are delimited by `'` or `"` and have
/// no escape sequences. A number directly followed by a unit letter
/// (`B K M G T`, optionally with a trailing `B`) is a size in bytes.
///
/// # Errors
///
/// Returns `ParseError` for unknown characters, unterminated strings and
/// malformed numbers or sizes.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let kind = match c {
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            ',' => {
                i += 1;
                TokenKind::Comma
            }
            '=' => {
                i += 1;
                TokenKind::Compare(CompareOp::Eq)
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                TokenKind::Compare(CompareOp::Ne)
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    i += 2;
                    TokenKind::Compare(CompareOp::Le)
                }
                Some('>') => {
                    i += 2;
                    TokenKind::Compare(CompareOp::Ne)
                }
                _ => {
                    i += 1;
                    TokenKind::Compare(CompareOp::Lt)
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    TokenKind::Compare(CompareOp::Ge)
                } else {
                    i += 1;
                    TokenKind::Compare(CompareOp::Gt)
                }
            }
            // A doubled quote inside a string stands for one quote
            '\'' | '"' => {
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => return Err(ParseError::UnterminatedString { pos: start }),
                        Some(&ch) if ch == c && chars.get(j + 1) == Some(&c) => {
                            text.push(c);
                            j += 2;
                        }
                        Some(&ch) if ch == c => break,
                        Some(&ch) => {
                            text.push(ch);
                            j += 1;
                        }
                    }
                }
                i = j + 1;
                TokenKind::Text(text)
            }
            '-' if chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                let (n, next) = lex_number(&chars, i + 1)?;
                i = next;
                TokenKind::Number(-n)
            }
            _ if c.is_ascii_digit() => {
                let (n, next) = lex_number(&chars, i)?;
                i = next;
                TokenKind::Number(n)
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                keyword(&word).unwrap_or(TokenKind::Ident(word))
            }
            _ => return Err(ParseError::UnexpectedChar { ch: c, pos: start }),
        };

        tokens.push(Token { kind, pos: start });
    }

    Ok(tokens)
}

/// Lex a number or size literal starting at `start`; returns the value and the
/// index after it.
fn lex_number(chars: &[char], start: usize) -> Result<(i64, usize), ParseError> {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    let digits_end = i;

    if let Some(&unit) = chars.get(i)
        && is_unit_char(unit)
    {
        i += 1;
        if !unit.eq_ignore_ascii_case(&'b') && chars.get(i).is_some_and(|c| c.eq_ignore_ascii_case(&'b')) {
            i += 1;
        }
    }

    let literal: String = chars[start..i].iter().collect();
    if chars.get(i).is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_') {
        let mut end = i;
        while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
        let bad: String = chars[start..end].iter().collect();
        return Err(if i > digits_end {
            ParseError::InvalidSize(bad)
        } else {
            ParseError::InvalidNumber(bad)
        });
    }

    if i > digits_end {
        let bytes = parse_size(&literal).ok_or_else(|| ParseError::InvalidSize(literal.clone()))?;
        return Ok((bytes, i));
    }

    let value = if literal.contains('.') {
        let f: f64 = literal
            .parse()
            .map_err(|_| ParseError::InvalidNumber(literal.clone()))?;
        if !f.is_finite() || f >= i64::MAX as f64 {
            return Err(ParseError::InvalidNumber(literal));
        }
        f as i64
    } else {
        literal
            .parse::<i64>()
            .map_err(|_| ParseError::InvalidNumber(literal.clone()))?
    };
    Ok((value, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds("size >= 10"),
            vec![
                TokenKind::Ident("size".into()),
                TokenKind::Compare(CompareOp::Ge),
                TokenKind::Number(10),
            ]
        );
    }

    #[test]
    fn test_tokenize_not_equal_variants() {
        assert_eq!(kinds("!= <>"), vec![
            TokenKind::Compare(CompareOp::Ne),
            TokenKind::Compare(CompareOp::Ne),
        ]);
    }

    #[test]
    fn test_tokenize_keywords_case_insensitive() {
        assert_eq!(
            kinds("and Or NOT like IlIkE rlike between in TRUE false"),
            vec![
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Like,
                TokenKind::Ilike,
                TokenKind::Rlike,
                TokenKind::Between,
                TokenKind::In,
                TokenKind::True,
                TokenKind::False,
            ]
        );
    }

    #[test]
    fn test_tokenize_sizes() {
        assert_eq!(kinds("1K"), vec![TokenKind::Number(1024)]);
        assert_eq!(kinds("10mb"), vec![TokenKind::Number(10 * 1024 * 1024)]);
        assert_eq!(kinds("1.5K"), vec![TokenKind::Number(1536)]);
    }

    #[test]
    fn test_tokenize_float_truncates() {
        assert_eq!(kinds("3.9"), vec![TokenKind::Number(3)]);
    }

    #[test]
    fn test_tokenize_negative_number() {
        assert_eq!(kinds("-5"), vec![TokenKind::Number(-5)]);
    }

    #[test]
    fn test_tokenize_strings() {
        assert_eq!(
            kinds(r#"'a b' "it's""#),
            vec![TokenKind::Text("a b".into()), TokenKind::Text("it's".into())]
        );
        assert_eq!(kinds("''"), vec![TokenKind::Text(String::new())]);
    }

    #[test]
    fn test_tokenize_doubled_quotes() {
        assert_eq!(kinds("'it''s'"), vec![TokenKind::Text("it's".into())]);
        assert_eq!(kinds(r#""say ""hi""""#), vec![TokenKind::Text(r#"say "hi""#.into())]);
        assert_eq!(kinds("''''"), vec![TokenKind::Text("'".into())]);
        assert_eq!(
            kinds("('', 'b')"),
            vec![
                TokenKind::LParen,
                TokenKind::Text(String::new()),
                TokenKind::Comma,
                TokenKind::Text("b".into()),
                TokenKind::RParen,
            ]
        );
        assert!(matches!(
            tokenize("'a''"),
            Err(ParseError::UnterminatedString { pos: 0 })
        ));
    }

    #[test]
    fn test_tokenize_positions() {
        let tokens = tokenize("a = 'x'").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.pos).collect();
        assert_eq!(positions, vec![0, 2, 4]);
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(matches!(
            tokenize("name = 'abc"),
            Err(ParseError::UnterminatedString { pos: 7 })
        ));
        assert!(matches!(
            tokenize("size > 10Q"),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            tokenize("size > 10Kx"),
            Err(ParseError::InvalidSize(_))
        ));
        assert!(matches!(
            tokenize("a # b"),
            Err(ParseError::UnexpectedChar { ch: '#', pos: 2 })
        ));
    }
}
