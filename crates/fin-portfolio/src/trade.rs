//! Trade planning: pure arithmetic for buy / sell / deposit.
//!
//! A plan is computed from the state read inside a store transaction and is
//! then applied verbatim. Nothing here touches storage, so the same rules run
//! under the Postgres store and the in-memory store.

use std::fmt;

use crate::fixedpoint::Micros;

/// Resulting state of a planned trade.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TradePlan {
    /// price × shares.
    pub total: Micros,
    pub cash_after: Micros,
    /// Holding after the trade; 0 means the row is deleted.
    pub shares_after: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    NonPositiveShares { shares: i64 },
    NonPositivePrice { price: Micros },
    NonPositiveAmount { amount: Micros },
    InsufficientFunds { required: Micros, available: Micros },
    InsufficientShares { requested: i64, owned: i64 },
    /// Arithmetic left the i64 range.
    Overflow,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::NonPositiveShares { shares } => {
                write!(f, "share count must be > 0, got {shares}")
            }
            PlanError::NonPositivePrice { price } => write!(f, "price must be > 0, got {price}"),
            PlanError::NonPositiveAmount { amount } => {
                write!(f, "amount must be > 0, got {amount}")
            }
            PlanError::InsufficientFunds {
                required,
                available,
            } => write!(f, "not enough cash: need {required}, have {available}"),
            PlanError::InsufficientShares { requested, owned } => {
                write!(f, "cannot sell {requested} shares, only {owned} owned")
            }
            PlanError::Overflow => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for PlanError {}

/// Parse a share count supplied as text. Only positive base-10 integers pass.
pub fn parse_shares(raw: &str) -> Result<i64, ParseSharesError> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(ParseSharesError::Missing);
    }
    let n: i64 = t
        .parse()
        .map_err(|_| ParseSharesError::NotAnInteger(t.to_string()))?;
    if n <= 0 {
        return Err(ParseSharesError::NotPositive(n));
    }
    Ok(n)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSharesError {
    Missing,
    NotAnInteger(String),
    NotPositive(i64),
}

impl fmt::Display for ParseSharesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSharesError::Missing => write!(f, "must provide number of shares"),
            ParseSharesError::NotAnInteger(raw) => {
                write!(f, "shares input '{raw}' is not an integer")
            }
            ParseSharesError::NotPositive(n) => {
                write!(f, "shares input {n} is not a positive integer")
            }
        }
    }
}

impl std::error::Error for ParseSharesError {}

fn check_inputs(price: Micros, shares: i64) -> Result<Micros, PlanError> {
    if shares <= 0 {
        return Err(PlanError::NonPositiveShares { shares });
    }
    if !price.is_positive() {
        return Err(PlanError::NonPositivePrice { price });
    }
    price.checked_mul_qty(shares).ok_or(PlanError::Overflow)
}

/// Plan a purchase of `shares` at `price` given current `cash` and `owned`.
pub fn plan_buy(cash: Micros, owned: i64, price: Micros, shares: i64) -> Result<TradePlan, PlanError> {
    let total = check_inputs(price, shares)?;
    if total > cash {
        return Err(PlanError::InsufficientFunds {
            required: total,
            available: cash,
        });
    }
    let shares_after = owned.checked_add(shares).ok_or(PlanError::Overflow)?;
    Ok(TradePlan {
        total,
        cash_after: cash - total,
        shares_after,
    })
}

/// Plan a sale of `shares` at `price`. Selling more than `owned` is refused.
pub fn plan_sell(cash: Micros, owned: i64, price: Micros, shares: i64) -> Result<TradePlan, PlanError> {
    let total = check_inputs(price, shares)?;
    if shares > owned {
        return Err(PlanError::InsufficientShares {
            requested: shares,
            owned,
        });
    }
    let cash_after = cash.checked_add(total).ok_or(PlanError::Overflow)?;
    Ok(TradePlan {
        total,
        cash_after,
        shares_after: owned - shares,
    })
}

/// Plan a cash top-up. Returns the new balance.
pub fn plan_deposit(cash: Micros, amount: Micros) -> Result<Micros, PlanError> {
    if !amount.is_positive() {
        return Err(PlanError::NonPositiveAmount { amount });
    }
    cash.checked_add(amount).ok_or(PlanError::Overflow)
}
