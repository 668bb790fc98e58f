use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fixedpoint::Micros;

/// Kind of a transaction-log row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Buy,
    Sell,
    Deposit,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Buy => "buy",
            TxKind::Sell => "sell",
            TxKind::Deposit => "deposit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(TxKind::Buy),
            "sell" => Some(TxKind::Sell),
            "deposit" => Some(TxKind::Deposit),
            _ => None,
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable row of the transaction log, without storage metadata.
///
/// Trades carry `symbol`, `stock_name` and `shares`. Deposits carry none
/// of them; their `price` is the deposited amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: TxKind,
    pub symbol: Option<String>,
    pub stock_name: Option<String>,
    pub price: Micros,
    pub shares: Option<i64>,
}

impl LogEntry {
    pub fn buy(symbol: impl Into<String>, name: impl Into<String>, price: Micros, shares: i64) -> Self {
        Self {
            kind: TxKind::Buy,
            symbol: Some(symbol.into()),
            stock_name: Some(name.into()),
            price,
            shares: Some(shares),
        }
    }

    pub fn sell(symbol: impl Into<String>, name: impl Into<String>, price: Micros, shares: i64) -> Self {
        Self {
            kind: TxKind::Sell,
            symbol: Some(symbol.into()),
            stock_name: Some(name.into()),
            price,
            shares: Some(shares),
        }
    }

    pub fn deposit(amount: Micros) -> Self {
        Self {
            kind: TxKind::Deposit,
            symbol: None,
            stock_name: None,
            price: amount,
            shares: None,
        }
    }
}

/// A user's aggregate holding in one symbol. `shares` is always > 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub shares: i64,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, shares: i64) -> Self {
        debug_assert!(shares > 0, "Holding.shares must be > 0");
        Self {
            symbol: symbol.into(),
            shares,
        }
    }
}
