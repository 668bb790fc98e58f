//! Request and response types for the fin-daemon HTTP API.
//!
//! Money goes out twice: raw micros for programs and a `*_usd` display string
//! for people. No business logic lives here.

use chrono::{DateTime, Utc};
use fin_engine::{DepositReceipt, TradeReceipt, TransactionRow};
use fin_portfolio::{format_usd, Micros, Valuation};
use fin_quote::Quote;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub quote_source: String,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// Stable code, e.g. "INSUFFICIENT_FUNDS".
    pub kind: String,
}

// ---------------------------------------------------------------------------
// /v1/auth/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirmation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub user_id: i64,
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

// ---------------------------------------------------------------------------
// /v1/quote/:symbol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub symbol: String,
    pub name: String,
    pub price: Micros,
    pub price_usd: String,
}

impl From<Quote> for QuoteResponse {
    fn from(q: Quote) -> Self {
        Self {
            price_usd: format_usd(q.price),
            symbol: q.symbol,
            name: q.name,
            price: q.price,
        }
    }
}

// ---------------------------------------------------------------------------
// /v1/buy  /v1/sell
// ---------------------------------------------------------------------------

/// `shares` is taken as raw JSON so `"10"` and `10` both work and anything
/// else reaches the engine's validation unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeRequest {
    pub symbol: String,
    pub shares: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResponse {
    pub transaction_id: i64,
    pub kind: String,
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub price: Micros,
    pub price_usd: String,
    pub total: Micros,
    pub total_usd: String,
    pub cash: Micros,
    pub cash_usd: String,
    pub shares_owned: i64,
}

impl From<TradeReceipt> for TradeResponse {
    fn from(r: TradeReceipt) -> Self {
        Self {
            transaction_id: r.transaction_id,
            kind: r.kind.as_str().to_string(),
            symbol: r.symbol,
            name: r.name,
            shares: r.shares,
            price: r.price,
            price_usd: format_usd(r.price),
            total: r.total,
            total_usd: format_usd(r.total),
            cash: r.cash_after,
            cash_usd: format_usd(r.cash_after),
            shares_owned: r.shares_after,
        }
    }
}

// ---------------------------------------------------------------------------
// /v1/cash
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositRequest {
    pub amount: Value,
    pub card: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositResponse {
    pub brand: String,
    pub amount: Micros,
    pub amount_usd: String,
    pub cash: Micros,
    pub cash_usd: String,
}

impl From<DepositReceipt> for DepositResponse {
    fn from(r: DepositReceipt) -> Self {
        Self {
            brand: r.brand.as_str().to_string(),
            amount: r.amount,
            amount_usd: format_usd(r.amount),
            cash: r.balance,
            cash_usd: format_usd(r.balance),
        }
    }
}

// ---------------------------------------------------------------------------
// /v1/portfolio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub price: Micros,
    pub price_usd: String,
    pub value: Micros,
    pub value_usd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioResponse {
    pub positions: Vec<PositionView>,
    pub cash: Micros,
    pub cash_usd: String,
    pub holdings_value: Micros,
    pub holdings_value_usd: String,
    pub total: Micros,
    pub total_usd: String,
}

impl From<Valuation> for PortfolioResponse {
    fn from(v: Valuation) -> Self {
        Self {
            positions: v
                .positions
                .into_iter()
                .map(|p| PositionView {
                    price_usd: format_usd(p.price),
                    value_usd: format_usd(p.value),
                    symbol: p.symbol,
                    name: p.name,
                    shares: p.shares,
                    price: p.price,
                    value: p.value,
                })
                .collect(),
            cash: v.cash,
            cash_usd: format_usd(v.cash),
            holdings_value: v.holdings_value,
            holdings_value_usd: format_usd(v.holdings_value),
            total: v.total,
            total_usd: format_usd(v.total),
        }
    }
}

// ---------------------------------------------------------------------------
// /v1/history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: i64,
    pub kind: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub shares: Option<i64>,
    /// Trade price per share, or the deposited amount.
    pub price: Micros,
    pub price_usd: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub transactions: Vec<HistoryItem>,
}

impl From<TransactionRow> for HistoryItem {
    fn from(t: TransactionRow) -> Self {
        Self {
            id: t.id,
            kind: t.entry.kind.as_str().to_string(),
            symbol: t.entry.symbol,
            name: t.entry.stock_name,
            shares: t.entry.shares,
            price: t.entry.price,
            price_usd: format_usd(t.entry.price),
            created_at: t.created_at,
        }
    }
}

/// Render a loosely-typed JSON field as the raw text the engine validates.
/// Missing and null become empty; numbers keep their JSON spelling.
pub(crate) fn raw_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
