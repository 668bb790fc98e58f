use std::fmt;

use fin_card::CardError;
use fin_portfolio::{format_usd, Micros, PlanError};
use fin_quote::QuoteError;

use crate::store::StoreError;

/// Every failure an engine operation can report to a caller.
#[derive(Debug)]
pub enum TradeError {
    Validation(String),
    NotFound(String),
    Unavailable(String),
    InsufficientFunds {
        required: Micros,
        available: Micros,
    },
    InsufficientShares {
        symbol: String,
        requested: i64,
        owned: i64,
    },
    InvalidCard(CardError),
    DuplicateUsername(String),
    /// Unknown user or wrong password; deliberately indistinguishable.
    Authentication,
    /// Backend failure. Logged, never shown to the end user verbatim.
    Storage(anyhow::Error),
}

impl TradeError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            TradeError::Validation(_) => "VALIDATION",
            TradeError::NotFound(_) => "NOT_FOUND",
            TradeError::Unavailable(_) => "UNAVAILABLE",
            TradeError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TradeError::InsufficientShares { .. } => "INSUFFICIENT_SHARES",
            TradeError::InvalidCard(_) => "INVALID_CARD",
            TradeError::DuplicateUsername(_) => "DUPLICATE_USERNAME",
            TradeError::Authentication => "AUTHENTICATION",
            TradeError::Storage(_) => "STORAGE",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        TradeError::Validation(msg.into())
    }

    /// Map a store refusal, attaching the symbol the trade was for.
    pub(crate) fn from_store(err: StoreError, symbol: Option<&str>) -> Self {
        match err {
            StoreError::Rejected(plan) => Self::from_plan(plan, symbol),
            StoreError::DuplicateUsername(name) => TradeError::DuplicateUsername(name),
            StoreError::UnknownUser(id) => {
                TradeError::Storage(anyhow::anyhow!("authenticated user {id} has no account row"))
            }
            StoreError::Backend(e) => TradeError::Storage(e),
        }
    }

    pub(crate) fn from_plan(err: PlanError, symbol: Option<&str>) -> Self {
        match err {
            PlanError::InsufficientFunds {
                required,
                available,
            } => TradeError::InsufficientFunds {
                required,
                available,
            },
            PlanError::InsufficientShares { requested, owned } => TradeError::InsufficientShares {
                symbol: symbol.unwrap_or_default().to_string(),
                requested,
                owned,
            },
            PlanError::Overflow => TradeError::validation("amount too large"),
            other => TradeError::Validation(other.to_string()),
        }
    }
}

impl fmt::Display for TradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeError::Validation(msg) => f.write_str(msg),
            TradeError::NotFound(msg) => f.write_str(msg),
            TradeError::Unavailable(msg) => f.write_str(msg),
            TradeError::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "not enough cash: need {}, have {}",
                format_usd(*required),
                format_usd(*available)
            ),
            TradeError::InsufficientShares {
                symbol,
                requested,
                owned,
            } => write!(
                f,
                "cannot sell {requested} shares of {symbol}: only {owned} owned"
            ),
            TradeError::InvalidCard(e) => write!(f, "invalid card: {e}"),
            TradeError::DuplicateUsername(name) => write!(f, "username '{name}' is taken"),
            TradeError::Authentication => f.write_str("invalid username and/or password"),
            TradeError::Storage(e) => write!(f, "storage failure: {e:#}"),
        }
    }
}

impl std::error::Error for TradeError {}

impl From<QuoteError> for TradeError {
    fn from(e: QuoteError) -> Self {
        match e {
            QuoteError::NotFound { .. } => TradeError::NotFound(e.to_string()),
            QuoteError::Unavailable(_) | QuoteError::Decode(_) => {
                TradeError::Unavailable(e.to_string())
            }
        }
    }
}

impl From<CardError> for TradeError {
    fn from(e: CardError) -> Self {
        TradeError::InvalidCard(e)
    }
}
