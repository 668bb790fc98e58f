//! fin-quote
//!
//! Price lookup boundary. The trading engine only sees [`QuoteProvider`];
//! concrete providers live in [`iex`] (HTTP) and [`fixed`] (in-process table).
//!
//! Prices leave this crate as `Micros`. Upstream JSON numbers are converted
//! from their decimal text, never through an `f64` product.

use std::fmt;

use fin_portfolio::Micros;
use serde::{Deserialize, Serialize};

pub mod fixed;
pub mod iex;

pub use fixed::StaticQuoteProvider;
pub use iex::IexQuoteProvider;

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// Current quote for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Company name, e.g. `"Apple Inc."`.
    pub name: String,
    /// Canonical upper-case ticker.
    pub symbol: String,
    pub price: Micros,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// The provider does not know this symbol.
    NotFound { symbol: String },
    /// Transport failure, timeout or non-success status.
    Unavailable(String),
    /// The provider answered but the payload was unusable.
    Decode(String),
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteError::NotFound { symbol } => write!(f, "unknown stock symbol '{symbol}'"),
            QuoteError::Unavailable(msg) => write!(f, "quote service unavailable: {msg}"),
            QuoteError::Decode(msg) => write!(f, "quote decode error: {msg}"),
        }
    }
}

impl std::error::Error for QuoteError {}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Upstream quote source.
///
/// Object-safe and `Send + Sync` so the engine can hold an
/// `Arc<dyn QuoteProvider>` across request tasks. Lookups are read-only and
/// may run concurrently.
#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// `symbol` is already normalised (see [`normalize_symbol`]).
    async fn lookup(&self, symbol: &str) -> Result<Quote, QuoteError>;
}

/// Trim and upper-case a user-supplied ticker. `None` if nothing is left.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_ascii_uppercase())
}

/// Tickers we are willing to put into a provider URL.
pub(crate) fn is_plausible_symbol(symbol: &str) -> bool {
    symbol.len() <= 16
        && symbol
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'^'))
}

/// Convert a JSON number to micros, rounding half away from zero at the
/// sixth decimal. Works on the number's decimal text (including exponent
/// forms such as `1.5e-7`). `None` when it does not fit.
pub(crate) fn json_number_to_micros(n: &serde_json::Number) -> Option<Micros> {
    let text = n.to_string();
    let (mantissa, exp) = match text.find(|c| c == 'e' || c == 'E') {
        Some(i) => (&text[..i], text[i + 1..].parse::<i32>().ok()?),
        None => (text.as_str(), 0),
    };

    let negative = mantissa.starts_with('-');
    let unsigned = mantissa.trim_start_matches(|c| c == '-' || c == '+');
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut digits: i128 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        if !b.is_ascii_digit() {
            return None;
        }
        digits = digits.checked_mul(10)?.checked_add(i128::from(b - b'0'))?;
    }

    // digits × 10^scale is the value in micros.
    let scale = exp.checked_sub(i32::try_from(frac_part.len()).ok()?)?.checked_add(6)?;
    let micros = if scale >= 0 {
        digits.checked_mul(10i128.checked_pow(u32::try_from(scale).ok()?)?)?
    } else {
        let shift = u32::try_from(-scale).ok()?;
        match 10i128.checked_pow(shift) {
            Some(div) => {
                let q = digits / div;
                let r = digits % div;
                if r * 2 >= div {
                    q + 1
                } else {
                    q
                }
            }
            None => 0,
        }
    };

    let signed = if negative { -micros } else { micros };
    i64::try_from(signed).ok().map(Micros::new)
}
