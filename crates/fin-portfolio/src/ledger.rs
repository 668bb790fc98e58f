//! Transaction-log replay.
//!
//! The log is the audit trail: starting from the seed balance, replaying
//! every entry in insertion order must reproduce the stored cash balance and
//! holdings exactly. [`replay`] rebuilds that state; [`audit`] compares it to
//! what the stores currently hold.
//!
//! Deterministic and pure. Two replays of the same log always agree.

use std::collections::BTreeMap;
use std::fmt;

use crate::fixedpoint::Micros;
use crate::types::{Holding, LogEntry, TxKind};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A log entry that cannot be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Trade entry without a symbol or share count.
    IncompleteTrade { index: usize },
    /// Share count on a trade entry is not > 0.
    NonPositiveShares { index: usize, shares: i64 },
    /// A sell takes the holding below zero.
    Oversold {
        index: usize,
        symbol: String,
        owned: i64,
        sold: i64,
    },
    Overflow { index: usize },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::IncompleteTrade { index } => {
                write!(f, "log entry #{index}: trade without symbol or shares")
            }
            LedgerError::NonPositiveShares { index, shares } => {
                write!(f, "log entry #{index}: shares must be > 0, got {shares}")
            }
            LedgerError::Oversold {
                index,
                symbol,
                owned,
                sold,
            } => write!(
                f,
                "log entry #{index}: sells {sold} {symbol} while only {owned} held"
            ),
            LedgerError::Overflow { index } => write!(f, "log entry #{index}: amount out of range"),
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// State derived purely from the seed balance and the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayState {
    pub cash: Micros,
    /// Only symbols with a positive count; flat positions are dropped.
    pub holdings: BTreeMap<String, i64>,
    pub entries: usize,
}

/// Rebuild cash and holdings from `initial_cash` plus `log`, in order.
pub fn replay<'a, I>(initial_cash: Micros, log: I) -> Result<ReplayState, LedgerError>
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut cash = initial_cash;
    let mut holdings: BTreeMap<String, i64> = BTreeMap::new();
    let mut entries = 0usize;

    for (index, entry) in log.into_iter().enumerate() {
        entries += 1;
        match entry.kind {
            TxKind::Deposit => {
                cash = cash
                    .checked_add(entry.price)
                    .ok_or(LedgerError::Overflow { index })?;
            }
            TxKind::Buy | TxKind::Sell => {
                let (Some(symbol), Some(shares)) = (entry.symbol.as_ref(), entry.shares) else {
                    return Err(LedgerError::IncompleteTrade { index });
                };
                if shares <= 0 {
                    return Err(LedgerError::NonPositiveShares { index, shares });
                }
                let total = entry
                    .price
                    .checked_mul_qty(shares)
                    .ok_or(LedgerError::Overflow { index })?;
                let held = holdings.get(symbol).copied().unwrap_or(0);

                let next = if entry.kind == TxKind::Buy {
                    cash = cash
                        .checked_sub(total)
                        .ok_or(LedgerError::Overflow { index })?;
                    held.checked_add(shares)
                        .ok_or(LedgerError::Overflow { index })?
                } else {
                    if shares > held {
                        return Err(LedgerError::Oversold {
                            index,
                            symbol: symbol.clone(),
                            owned: held,
                            sold: shares,
                        });
                    }
                    cash = cash
                        .checked_add(total)
                        .ok_or(LedgerError::Overflow { index })?;
                    held - shares
                };

                if next == 0 {
                    holdings.remove(symbol);
                } else {
                    holdings.insert(symbol.clone(), next);
                }
            }
        }
    }

    Ok(ReplayState {
        cash,
        holdings,
        entries,
    })
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// One disagreement between the replayed log and the stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Drift {
    Cash { replayed: Micros, stored: Micros },
    Shares {
        symbol: String,
        replayed: i64,
        stored: i64,
    },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drift::Cash { replayed, stored } => {
                write!(f, "cash: replayed={replayed} stored={stored}")
            }
            Drift::Shares {
                symbol,
                replayed,
                stored,
            } => write!(f, "{symbol}: replayed={replayed} stored={stored}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    pub replayed: ReplayState,
    pub drifts: Vec<Drift>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.drifts.is_empty()
    }
}

/// Replay the log and diff it against the stored balance and holdings.
///
/// Drifts are listed cash first, then by symbol.
pub fn audit(
    initial_cash: Micros,
    log: &[LogEntry],
    stored_cash: Micros,
    stored_holdings: &[Holding],
) -> Result<AuditReport, LedgerError> {
    let replayed = replay(initial_cash, log)?;
    let mut drifts = Vec::new();

    if replayed.cash != stored_cash {
        drifts.push(Drift::Cash {
            replayed: replayed.cash,
            stored: stored_cash,
        });
    }

    let stored: BTreeMap<&str, i64> = stored_holdings
        .iter()
        .map(|h| (h.symbol.as_str(), h.shares))
        .collect();

    let mut symbols: Vec<&str> = replayed
        .holdings
        .keys()
        .map(String::as_str)
        .chain(stored.keys().copied())
        .collect();
    symbols.sort_unstable();
    symbols.dedup();

    for symbol in symbols {
        let r = replayed.holdings.get(symbol).copied().unwrap_or(0);
        let s = stored.get(symbol).copied().unwrap_or(0);
        if r != s {
            drifts.push(Drift::Shares {
                symbol: symbol.to_string(),
                replayed: r,
                stored: s,
            });
        }
    }

    Ok(AuditReport { replayed, drifts })
}
