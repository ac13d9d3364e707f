//! The 62-symbol label alphabet.
//!
//! Offsets, positions and gap lengths are shown as single characters from
//! `0-9A-Za-z`. Values that do not fit render as a delimited decimal, e.g.
//! `(62)`, so a label never wraps around silently.

use crate::error::{Error, Result};

/// Digits, then uppercase, then lowercase.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Appends the label for `value` to `out`: one alphabet character, or
/// `(value)` if it is too large.
pub fn push_label(out: &mut String, value: u64) {
    match char_for(value) {
        Some(c) => out.push(c),
        None => {
            out.push('(');
            out.push_str(&value.to_string());
            out.push(')');
        }
    }
}

fn char_for(value: u64) -> Option<char> {
    if value < ALPHABET.len() as u64 {
        Some(ALPHABET[value as usize] as char)
    } else {
        None
    }
}

fn value_of(c: char) -> Option<u64> {
    match c {
        '0'..='9' => Some(c as u64 - '0' as u64),
        'A'..='Z' => Some(c as u64 - 'A' as u64 + 10),
        'a'..='z' => Some(c as u64 - 'a' as u64 + 36),
        _ => None,
    }
}

/// Parses a complete label: one alphabet character or a delimited decimal.
pub fn parse_label(s: &str) -> Result<u64> {
    let mut labels = Labels::new(s);
    let value = labels.next().transpose()?;
    match (value, labels.next()) {
        (Some(v), None) => Ok(v),
        _ => Err(Error::InvalidInput(format!("expected exactly one label, got {:?}", s))),
    }
}

/// Iterator over the labels in a string.
struct Labels<'a> {
    text: &'a str,
    rest: std::str::Chars<'a>,
}

impl<'a> Labels<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, rest: text.chars() }
    }

    fn invalid(&self) -> Error {
        Error::InvalidInput(format!("invalid label text {:?}", self.text))
    }
}

impl Iterator for Labels<'_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.rest.next()?;
        if c != '(' {
            return Some(value_of(c).ok_or_else(|| self.invalid()));
        }
        let mut digits = String::new();
        loop {
            match self.rest.next() {
                Some(')') => break,
                Some(d) if d.is_ascii_digit() => digits.push(d),
                _ => return Some(Err(self.invalid())),
            }
        }
        Some(digits.parse::<u64>().map_err(|_| self.invalid()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(value: u64) -> String {
        let mut out = String::new();
        push_label(&mut out, value);
        out
    }

    #[test]
    fn test_label_alphabet() {
        assert_eq!(label(0), "0");
        assert_eq!(label(9), "9");
        assert_eq!(label(10), "A");
        assert_eq!(label(35), "Z");
        assert_eq!(label(36), "a");
        assert_eq!(label(61), "z");
        for v in 0..62 {
            assert_eq!(parse_label(&label(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_label_overflow_is_delimited() {
        assert_eq!(label(62), "(62)");
        assert_eq!(label(100), "(100)");
        assert_eq!(parse_label("(62)").unwrap(), 62);
    }

    #[test]
    fn test_parse_labels() {
        let mut s = String::new();
        for v in [3, 61, 62, 0] {
            push_label(&mut s, v);
        }
        assert_eq!(s, "3z(62)0");
        let values: Vec<u64> = Labels::new(&s).collect::<Result<_>>().unwrap();
        assert_eq!(values, vec![3, 61, 62, 0]);
        assert_eq!(Labels::new("").count(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_label("").is_err());
        assert!(parse_label("12").is_err());
        assert!(parse_label("(12").is_err());
        assert!(parse_label("()").is_err());
        assert!(parse_label("-").is_err());
    }
}
