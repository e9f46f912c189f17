//! Size literal parsing and formatting
//!
//! Size literals use binary multiples: `1K` is 1024 bytes, `1M` is 1024 KiB and
//! so on. A trailing `B` after the unit is accepted (`10MB` equals `10M`).

use byte_unit::{Byte, UnitType};

const UNITS: [(char, u64); 5] = [
    ('B', 1),
    ('K', 1 << 10),
    ('M', 1 << 20),
    ('G', 1 << 30),
    ('T', 1 << 40),
];

/// Parse a size string such as `10M`, `1.5K`, `512` or `2GB` into bytes
///
/// Returns `None` for anything that is not a non-negative number followed by an
/// optional unit.
#[must_use]
pub fn parse_size(input: &str) -> Option<i64> {
    let upper = input.trim().to_ascii_uppercase();
    let split = upper
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(upper.len());
    let (num_part, unit_part) = upper.split_at(split);

    let num_part = num_part.trim();
    if num_part.is_empty() || !num_part.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let multiplier = unit_multiplier(unit_part.trim())?;

    if let Ok(whole) = num_part.parse::<i64>() {
        return whole.checked_mul(i64::try_from(multiplier).ok()?);
    }

    let num: f64 = num_part.parse().ok()?;
    let bytes = num * multiplier as f64;
    if bytes.is_finite() && bytes < i64::MAX as f64 {
        Some(bytes as i64)
    } else {
        None
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let mut chars = unit.chars();
    let Some(first) = chars.next() else {
        return Some(1);
    };
    let rest: String = chars.collect();
    if !(rest.is_empty() || (rest == "B" && first != 'B')) {
        return None;
    }
    UNITS
        .iter()
        .find(|(c, _)| *c == first)
        .map(|(_, multiplier)| *multiplier)
}

/// Whether a unit letter may terminate a numeric size literal
#[must_use]
pub fn is_unit_char(c: char) -> bool {
    UNITS.iter().any(|(u, _)| *u == c.to_ascii_uppercase())
}

/// Human-readable size using binary units, e.g. `1.50 KiB`
#[must_use]
pub fn format_size(bytes: u64) -> String {
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary);
    format!("{adjusted:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_number() {
        assert_eq!(parse_size("512"), Some(512));
    }

    #[test]
    fn test_parse_binary_units() {
        assert_eq!(parse_size("1K"), Some(1024));
        assert_eq!(parse_size("10M"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("1g"), Some(1 << 30));
        assert_eq!(parse_size("2T"), Some(2 << 40));
        assert_eq!(parse_size("7B"), Some(7));
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(parse_size("1.5K"), Some(1536));
        assert_eq!(parse_size("0.5M"), Some(512 * 1024));
    }

    #[test]
    fn test_parse_trailing_b() {
        assert_eq!(parse_size("10MB"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("1kb"), Some(1024));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("K"), None);
        assert_eq!(parse_size("10Q"), None);
        assert_eq!(parse_size("potato"), None);
        assert_eq!(parse_size("1BB"), None);
        assert_eq!(parse_size("-5K"), None);
    }

    #[test]
    fn test_format_size() {
        assert!(format_size(1536).contains("KiB"));
        assert!(format_size(10 * 1024 * 1024).starts_with("10"));
    }
}
