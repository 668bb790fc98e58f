//! fin-card
//!
//! Payment-card checks for cash deposits: Luhn checksum plus a closed set of
//! brand rules. A number is accepted only when both pass.
//!
//! Brand rules (length, prefix):
//! - American Express: 15 digits, starts with 34 or 37
//! - Mastercard: 16 digits, starts with 51 through 55
//! - Visa: 13 or 16 digits, starts with 4

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardBrand {
    AmericanExpress,
    Mastercard,
    Visa,
}

impl CardBrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::AmericanExpress => "American Express",
            CardBrand::Mastercard => "Mastercard",
            CardBrand::Visa => "Visa",
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardError {
    Empty,
    /// Something other than digits, spaces or hyphens.
    NonDigit,
    Checksum,
    /// Checksum passed but no brand rule matched.
    UnknownBrand { len: usize },
}

impl fmt::Display for CardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardError::Empty => write!(f, "card number is empty"),
            CardError::NonDigit => write!(f, "card number must contain only digits"),
            CardError::Checksum => write!(f, "card number failed checksum"),
            CardError::UnknownBrand { len } => {
                write!(f, "{len}-digit card number matches no accepted brand")
            }
        }
    }
}

impl std::error::Error for CardError {}

/// Digits of `raw` with spaces and hyphens removed.
fn digits(raw: &str) -> Result<Vec<u8>, CardError> {
    let mut out = Vec::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            ' ' | '-' => continue,
            '0'..='9' => out.push(ch as u8 - b'0'),
            _ => return Err(CardError::NonDigit),
        }
    }
    if out.is_empty() {
        return Err(CardError::Empty);
    }
    Ok(out)
}

fn luhn_sum(digits: &[u8]) -> u32 {
    digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = u32::from(d);
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled >= 10 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum()
}

/// Luhn checksum only. Non-digit input is never valid.
pub fn luhn_valid(raw: &str) -> bool {
    match digits(raw) {
        Ok(d) => luhn_sum(&d) % 10 == 0,
        Err(_) => false,
    }
}

fn brand_of(d: &[u8]) -> Option<CardBrand> {
    match (d.len(), d) {
        (15, [3, 4 | 7, ..]) => Some(CardBrand::AmericanExpress),
        (16, [5, 1..=5, ..]) => Some(CardBrand::Mastercard),
        (13 | 16, [4, ..]) => Some(CardBrand::Visa),
        _ => None,
    }
}

/// Validate `raw` and return its brand.
pub fn classify(raw: &str) -> Result<CardBrand, CardError> {
    let d = digits(raw)?;
    if luhn_sum(&d) % 10 != 0 {
        return Err(CardError::Checksum);
    }
    brand_of(&d).ok_or(CardError::UnknownBrand { len: d.len() })
}
