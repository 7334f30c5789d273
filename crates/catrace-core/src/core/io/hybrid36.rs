//! Hybrid-36 numbering for fixed-width record fields.
//!
//! Values that fit in `width` decimal digits are written in decimal. Larger
//! values continue in base 36, first with upper-case digits (`A000`, `A001`,
//! ...) and then with lower-case digits (`a000`, ...), which extends a 4-column
//! field from 9999 to 2436111 while keeping every decimal number unchanged.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Hybrid36Error {
    #[error("Value {value} does not fit in a {width}-column hybrid-36 field")]
    Overflow { value: i64, width: usize },
    #[error("Invalid hybrid-36 field '{0}'")]
    InvalidField(String),
    #[error("Field '{0}' is empty")]
    Empty(String),
}

const UPPER: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn pow(base: i64, exp: usize) -> i64 {
    (0..exp).fold(1, |acc, _| acc * base)
}

fn to_base36(mut value: i64, width: usize, digits: &[u8; 36]) -> String {
    let mut out = vec![b'0'; width];
    for slot in out.iter_mut().rev() {
        *slot = digits[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn from_base36(field: &str) -> Option<i64> {
    field.chars().try_fold(0i64, |acc, c| {
        c.to_digit(36).map(|d| acc * 36 + d as i64)
    })
}

/// Encodes `value` into exactly `width` columns, right-aligned.
pub fn encode(value: i64, width: usize) -> Result<String, Hybrid36Error> {
    let decimal_limit = pow(10, width);
    let overflow = Hybrid36Error::Overflow { value, width };
    if value < 0 {
        let text = value.to_string();
        return if text.len() <= width {
            Ok(format!("{text:>width$}"))
        } else {
            Err(overflow)
        };
    }
    if value < decimal_limit {
        return Ok(format!("{value:>width$}"));
    }

    let block = 26 * pow(36, width - 1);
    let letter_offset = 10 * pow(36, width - 1);
    let mut rest = value - decimal_limit;
    if rest < block {
        return Ok(to_base36(rest + letter_offset, width, UPPER));
    }
    rest -= block;
    if rest < block {
        return Ok(to_base36(rest + letter_offset, width, LOWER));
    }
    Err(overflow)
}

/// Decodes a `width`-column field written by [`encode`].
///
/// Surrounding blanks are ignored for decimal values.
pub fn decode(field: &str, width: usize) -> Result<i64, Hybrid36Error> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Err(Hybrid36Error::Empty(field.to_string()));
    }
    let invalid = || Hybrid36Error::InvalidField(field.to_string());

    let first = trimmed.chars().next().ok_or_else(invalid)?;
    if first == '-' || first.is_ascii_digit() {
        return trimmed.parse::<i64>().map_err(|_| invalid());
    }
    if trimmed.len() != width {
        return Err(invalid());
    }

    let decimal_limit = pow(10, width);
    let base = pow(36, width - 1);
    let rest = &trimmed[1..];
    if first.is_ascii_uppercase() && !rest.chars().any(|c| c.is_ascii_lowercase()) {
        let raw = from_base36(trimmed).ok_or_else(invalid)?;
        Ok(raw - 10 * base + decimal_limit)
    } else if first.is_ascii_lowercase() && !rest.chars().any(|c| c.is_ascii_uppercase()) {
        let raw = from_base36(trimmed).ok_or_else(invalid)?;
        Ok(raw + 16 * base + decimal_limit)
    } else {
        Err(invalid())
    }
}
