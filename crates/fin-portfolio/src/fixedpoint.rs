//! Fixed-point money type.
//!
//! Cash balances, prices, trade totals and deposits are all `Micros`: an
//! `i64` at 1e-6 scale (1 USD = 1_000_000). Share counts stay plain `i64`
//! and never convert implicitly.
//!
//! There is no `From<i64>` and no float constructor. User input enters
//! through [`Micros::parse_decimal`], which reads the decimal string digit
//! by digit and refuses anything that would need rounding.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Micros per whole dollar.
pub const MICROS_PER_DOLLAR: i64 = 1_000_000;

const MICROS_PER_CENT: i64 = 10_000;
const MAX_FRACTION_DIGITS: usize = 6;

// ---------------------------------------------------------------------------
// Micros newtype
// ---------------------------------------------------------------------------

/// A monetary amount at 1e-6 scale.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Micros(i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);
    pub const MAX: Micros = Micros(i64::MAX);
    pub const MIN: Micros = Micros(i64::MIN);

    /// Wrap a raw micros value (e.g. a `bigint` column).
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Whole dollars. Returns `None` on overflow.
    #[inline]
    pub const fn from_dollars(dollars: i64) -> Option<Self> {
        match dollars.checked_mul(MICROS_PER_DOLLAR) {
            Some(raw) => Some(Micros(raw)),
            None => None,
        }
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn checked_add(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_add(rhs.0).map(Micros)
    }

    #[inline]
    pub fn checked_sub(self, rhs: Micros) -> Option<Micros> {
        self.0.checked_sub(rhs.0).map(Micros)
    }

    /// Per-share price times a share count. `None` on overflow; a trade
    /// total that does not fit is rejected, never clamped.
    #[inline]
    pub fn checked_mul_qty(self, qty: i64) -> Option<Micros> {
        self.0.checked_mul(qty).map(Micros)
    }

    /// Round half away from zero to whole cents.
    pub fn round_to_cents(self) -> Micros {
        let rem = self.0 % MICROS_PER_CENT;
        let base = self.0 - rem;
        let adjusted = if rem.abs() * 2 >= MICROS_PER_CENT {
            base.saturating_add(rem.signum() * MICROS_PER_CENT)
        } else {
            base
        };
        Micros(adjusted)
    }

    /// Parse a plain decimal string (`"10"`, `"-3.5"`, `"0.000001"`).
    ///
    /// Accepts an optional sign and at most six fractional digits. Exponents,
    /// thousands separators and currency symbols are rejected.
    pub fn parse_decimal(s: &str) -> Result<Micros, MoneyParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, body) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(MoneyParseError::Invalid(s.to_string()));
        }
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(MoneyParseError::Invalid(s.to_string()));
        }
        if frac_part.len() > MAX_FRACTION_DIGITS {
            return Err(MoneyParseError::TooPrecise(s.to_string()));
        }

        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| MoneyParseError::Overflow(s.to_string()))?
        };

        let mut frac: i64 = 0;
        for b in frac_part.bytes() {
            frac = frac * 10 + i64::from(b - b'0');
        }
        for _ in frac_part.len()..MAX_FRACTION_DIGITS {
            frac *= 10;
        }

        let magnitude = whole
            .checked_mul(MICROS_PER_DOLLAR)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| MoneyParseError::Overflow(s.to_string()))?;

        Ok(Micros(if negative { -magnitude } else { magnitude }))
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    Empty,
    Invalid(String),
    /// More than six fractional digits.
    TooPrecise(String),
    Overflow(String),
}

impl fmt::Display for MoneyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyParseError::Empty => write!(f, "amount is empty"),
            MoneyParseError::Invalid(raw) => write!(f, "'{raw}' is not a decimal amount"),
            MoneyParseError::TooPrecise(raw) => {
                write!(f, "'{raw}' has more than {MAX_FRACTION_DIGITS} decimal places")
            }
            MoneyParseError::Overflow(raw) => write!(f, "'{raw}' is out of range"),
        }
    }
}

impl std::error::Error for MoneyParseError {}

// ---------------------------------------------------------------------------
// Arithmetic (closed over Micros)
// ---------------------------------------------------------------------------

impl Add for Micros {
    type Output = Micros;
    #[inline]
    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0 + rhs.0)
    }
}

impl Sub for Micros {
    type Output = Micros;
    #[inline]
    fn sub(self, rhs: Micros) -> Micros {
        Micros(self.0 - rhs.0)
    }
}

impl Neg for Micros {
    type Output = Micros;
    #[inline]
    fn neg(self) -> Micros {
        Micros(-self.0)
    }
}

impl AddAssign for Micros {
    #[inline]
    fn add_assign(&mut self, rhs: Micros) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Micros {
    #[inline]
    fn sub_assign(&mut self, rhs: Micros) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Micros {
    fn sum<I: Iterator<Item = Micros>>(iter: I) -> Micros {
        iter.fold(Micros::ZERO, |acc, m| acc + m)
    }
}

// ---------------------------------------------------------------------------
// Display / USD formatting
// ---------------------------------------------------------------------------

/// Plain decimal with all six fractional digits, e.g. `"12.500000"`.
impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MICROS_PER_DOLLAR as u64;
        write!(f, "{sign}{}.{:06}", abs / per, abs % per)
    }
}

/// Human currency string: `"$1,234.56"`, `"-$0.50"`.
///
/// Rounds half away from zero to cents before formatting.
pub fn format_usd(amount: Micros) -> String {
    let cents_total = amount.round_to_cents().raw() / MICROS_PER_CENT;
    let sign = if cents_total < 0 { "-" } else { "" };
    let abs = cents_total.unsigned_abs();
    let dollars = abs / 100;
    let cents = abs % 100;
    format!("{sign}${}.{cents:02}", group_thousands(dollars))
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
