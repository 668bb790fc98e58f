//! Storage seam for the three stores: accounts, holdings and the transaction
//! log.
//!
//! Each `execute_*` call is one atomic unit. Implementations must read the
//! user's cash and holding, plan with [`fin_portfolio::trade`] and apply the
//! plan while nothing else can touch that user. A refused plan comes back as
//! [`StoreError::Rejected`] and leaves every store untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use fin_portfolio::{Holding, LogEntry, Micros, PlanError, TxKind};
use fin_quote::Quote;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub cash: Micros,
    pub initial_cash: Micros,
    pub created_at: DateTime<Utc>,
}

/// One persisted transaction-log row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: i64,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: LogEntry,
}

/// Outcome of a committed buy or sell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub transaction_id: i64,
    pub kind: TxKind,
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub price: Micros,
    pub total: Micros,
    pub cash_after: Micros,
    pub shares_after: i64,
}

#[derive(Debug)]
pub enum StoreError {
    DuplicateUsername(String),
    UnknownUser(UserId),
    /// The trade plan was refused; nothing was written.
    Rejected(PlanError),
    Backend(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateUsername(name) => write!(f, "username '{name}' already exists"),
            StoreError::UnknownUser(id) => write!(f, "no user with id {id}"),
            StoreError::Rejected(e) => write!(f, "rejected: {e}"),
            StoreError::Backend(e) => write!(f, "backend error: {e:#}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Backend(e)
    }
}

impl From<PlanError> for StoreError {
    fn from(e: PlanError) -> Self {
        StoreError::Rejected(e)
    }
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Fails with `DuplicateUsername` if the name is taken, including when a
    /// concurrent registration wins the race.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        initial_cash: Micros,
    ) -> Result<UserId, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError>;

    async fn fetch_user(&self, user: UserId) -> Result<UserRow, StoreError>;

    /// Positive holdings, ordered by symbol.
    async fn holdings(&self, user: UserId) -> Result<Vec<Holding>, StoreError>;

    /// Transaction log in insertion order.
    async fn history(&self, user: UserId) -> Result<Vec<TransactionRow>, StoreError>;

    async fn execute_buy(
        &self,
        user: UserId,
        quote: &Quote,
        shares: i64,
    ) -> Result<TradeReceipt, StoreError>;

    async fn execute_sell(
        &self,
        user: UserId,
        quote: &Quote,
        shares: i64,
    ) -> Result<TradeReceipt, StoreError>;

    /// Credit `amount` and log it. Returns the new cash balance.
    async fn execute_deposit(&self, user: UserId, amount: Micros) -> Result<Micros, StoreError>;
}
