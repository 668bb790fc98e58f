//! fin-portfolio
//!
//! Money and portfolio arithmetic for the trading service.
//! - `Micros` fixed-point money and `format_usd`
//! - trade planning (buy / sell / deposit deltas and refusals)
//! - valuation of marked holdings
//! - transaction-log replay and audit
//! - pure, deterministic logic (no IO, no time, no storage)

pub mod fixedpoint;
pub mod ledger;
pub mod trade;
pub mod valuation;

mod types;

pub use fixedpoint::{format_usd, Micros, MoneyParseError, MICROS_PER_DOLLAR};
pub use ledger::{audit, replay, AuditReport, Drift, LedgerError, ReplayState};
pub use trade::{
    parse_shares, plan_buy, plan_deposit, plan_sell, ParseSharesError, PlanError, TradePlan,
};
pub use types::{Holding, LogEntry, TxKind};
pub use valuation::{value_portfolio, MarkedHolding, PositionValue, Valuation};
