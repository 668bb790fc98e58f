//! Trading engine: validates raw input, prices it, and delegates the atomic
//! mutation to the [`Store`]. Every call takes an explicit [`UserId`].

use std::sync::Arc;
use std::time::Duration;

use fin_card::CardBrand;
use fin_portfolio::{
    audit, parse_shares, value_portfolio, AuditReport, MarkedHolding, Micros, ParseSharesError,
    Valuation,
};
use fin_quote::{normalize_symbol, Quote, QuoteProvider};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TradeError;
use crate::password::{hash_password, verify_password};
use crate::store::{Store, StoreError, TradeReceipt, TransactionRow, UserId};

const MAX_USERNAME_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seed balance for new accounts.
    pub initial_cash: Micros,
    pub quote_timeout: Duration,
    pub password_iterations: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_cash: Micros::new(10_000 * fin_portfolio::MICROS_PER_DOLLAR),
            quote_timeout: Duration::from_secs(5),
            password_iterations: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub brand: CardBrand,
    pub amount: Micros,
    pub balance: Micros,
}

pub struct Engine {
    store: Arc<dyn Store>,
    quotes: Arc<dyn QuoteProvider>,
    cfg: EngineConfig,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, quotes: Arc<dyn QuoteProvider>, cfg: EngineConfig) -> Self {
        Self { store, quotes, cfg }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn quote_source(&self) -> &'static str {
        self.quotes.source_name()
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<UserId, TradeError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TradeError::validation("must provide username"));
        }
        if username.len() > MAX_USERNAME_LEN {
            return Err(TradeError::Validation(format!(
                "username must be at most {MAX_USERNAME_LEN} bytes"
            )));
        }
        if password.is_empty() {
            return Err(TradeError::validation("must provide password"));
        }
        if confirmation.is_empty() {
            return Err(TradeError::validation("must confirm password"));
        }
        if password != confirmation {
            return Err(TradeError::validation("passwords do not match"));
        }

        if self
            .store
            .find_user_by_username(username)
            .await
            .map_err(|e| TradeError::from_store(e, None))?
            .is_some()
        {
            return Err(TradeError::DuplicateUsername(username.to_string()));
        }

        let hash = self.hash_off_thread(password).await?;
        let id = self
            .store
            .create_user(username, &hash, self.cfg.initial_cash)
            .await
            .map_err(|e| TradeError::from_store(e, None))?;

        info!(user_id = %id, username, "account registered");
        Ok(id)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserId, TradeError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TradeError::validation("must provide username"));
        }
        if password.is_empty() {
            return Err(TradeError::validation("must provide password"));
        }

        let Some(row) = self
            .store
            .find_user_by_username(username)
            .await
            .map_err(|e| TradeError::from_store(e, None))?
        else {
            warn!(username, "login failed");
            return Err(TradeError::Authentication);
        };

        let password = password.to_string();
        let stored = row.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| TradeError::Storage(anyhow::anyhow!("password check task failed: {e}")))?;

        if !ok {
            warn!(username, "login failed");
            return Err(TradeError::Authentication);
        }
        Ok(row.id)
    }

    async fn hash_off_thread(&self, password: &str) -> Result<String, TradeError> {
        let password = password.to_string();
        let iterations = self.cfg.password_iterations;
        tokio::task::spawn_blocking(move || hash_password(&password, iterations))
            .await
            .map_err(|e| TradeError::Storage(anyhow::anyhow!("password hash task failed: {e}")))
    }

    // -----------------------------------------------------------------------
    // Quotes
    // -----------------------------------------------------------------------

    pub async fn quote(&self, symbol_raw: &str) -> Result<Quote, TradeError> {
        let symbol = require_symbol(symbol_raw)?;
        self.lookup(&symbol).await
    }

    async fn lookup(&self, symbol: &str) -> Result<Quote, TradeError> {
        match tokio::time::timeout(self.cfg.quote_timeout, self.quotes.lookup(symbol)).await {
            Ok(Ok(q)) => Ok(q),
            Ok(Err(e)) => {
                warn!(symbol, source = self.quotes.source_name(), error = %e, "quote lookup failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(symbol, source = self.quotes.source_name(), "quote lookup timed out");
                Err(TradeError::Unavailable(format!(
                    "quote lookup for {symbol} timed out after {}ms",
                    self.cfg.quote_timeout.as_millis()
                )))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Trades
    // -----------------------------------------------------------------------

    pub async fn buy(
        &self,
        user: UserId,
        symbol_raw: &str,
        shares_raw: &str,
    ) -> Result<TradeReceipt, TradeError> {
        let symbol = require_symbol(symbol_raw)?;
        let shares = require_shares(shares_raw)?;
        let quote = self.lookup(&symbol).await?;

        let receipt = self
            .store
            .execute_buy(user, &quote, shares)
            .await
            .map_err(|e| self.refused(e, user, "buy", &symbol))?;

        info!(
            user_id = %user,
            symbol = %receipt.symbol,
            shares,
            price = %receipt.price,
            total = %receipt.total,
            "buy executed"
        );
        Ok(receipt)
    }

    pub async fn sell(
        &self,
        user: UserId,
        symbol_raw: &str,
        shares_raw: &str,
    ) -> Result<TradeReceipt, TradeError> {
        let symbol = require_symbol(symbol_raw)?;
        let shares = require_shares(shares_raw)?;
        let quote = self.lookup(&symbol).await?;

        let receipt = self
            .store
            .execute_sell(user, &quote, shares)
            .await
            .map_err(|e| self.refused(e, user, "sell", &symbol))?;

        info!(
            user_id = %user,
            symbol = %receipt.symbol,
            shares,
            price = %receipt.price,
            total = %receipt.total,
            "sell executed"
        );
        Ok(receipt)
    }

    pub async fn deposit(
        &self,
        user: UserId,
        amount_raw: &str,
        card_raw: &str,
    ) -> Result<DepositReceipt, TradeError> {
        let amount_raw = amount_raw.trim();
        if amount_raw.is_empty() {
            return Err(TradeError::validation("must provide amount"));
        }
        let amount = Micros::parse_decimal(amount_raw)
            .map_err(|e| TradeError::Validation(format!("invalid amount: {e}")))?;
        if !amount.is_positive() {
            return Err(TradeError::validation("amount must be positive"));
        }
        if card_raw.trim().is_empty() {
            return Err(TradeError::validation("must provide card number"));
        }
        let brand = fin_card::classify(card_raw)?;

        let balance = self
            .store
            .execute_deposit(user, amount)
            .await
            .map_err(|e| self.refused(e, user, "deposit", ""))?;

        info!(user_id = %user, amount = %amount, brand = %brand, "deposit credited");
        Ok(DepositReceipt {
            brand,
            amount,
            balance,
        })
    }

    fn refused(&self, err: StoreError, user: UserId, op: &str, symbol: &str) -> TradeError {
        match &err {
            StoreError::Rejected(plan) => {
                info!(user_id = %user, op, symbol, reason = %plan, "trade refused")
            }
            other => tracing::error!(user_id = %user, op, symbol, error = %other, "store failure"),
        }
        TradeError::from_store(err, Some(symbol))
    }

    // -----------------------------------------------------------------------
    // Read paths
    // -----------------------------------------------------------------------

    /// Mark every holding at its current price. Any failed lookup fails the
    /// whole valuation; a missing price is never treated as zero.
    pub async fn portfolio(&self, user: UserId) -> Result<Valuation, TradeError> {
        let row = self
            .store
            .fetch_user(user)
            .await
            .map_err(|e| TradeError::from_store(e, None))?;
        let holdings = self
            .store
            .holdings(user)
            .await
            .map_err(|e| TradeError::from_store(e, None))?;

        let quotes = try_join_all(holdings.iter().map(|h| self.lookup(&h.symbol))).await?;

        let marked = holdings
            .into_iter()
            .zip(quotes)
            .map(|(h, q)| MarkedHolding {
                symbol: h.symbol,
                name: q.name,
                shares: h.shares,
                price: q.price,
            })
            .collect();

        value_portfolio(row.cash, marked)
            .ok_or_else(|| TradeError::Storage(anyhow::anyhow!("portfolio value overflow for user {user}")))
    }

    pub async fn history(&self, user: UserId) -> Result<Vec<TransactionRow>, TradeError> {
        self.store
            .history(user)
            .await
            .map_err(|e| TradeError::from_store(e, None))
    }

    /// Replay the user's log from the seed balance and compare with the
    /// stored cash and holdings.
    pub async fn audit(&self, user: UserId) -> Result<AuditReport, TradeError> {
        let row = self
            .store
            .fetch_user(user)
            .await
            .map_err(|e| TradeError::from_store(e, None))?;
        let holdings = self
            .store
            .holdings(user)
            .await
            .map_err(|e| TradeError::from_store(e, None))?;
        let log: Vec<_> = self
            .history(user)
            .await?
            .into_iter()
            .map(|t| t.entry)
            .collect();

        let report = audit(row.initial_cash, &log, row.cash, &holdings)
            .map_err(|e| TradeError::Storage(anyhow::anyhow!("ledger replay failed: {e}")))?;

        if !report.is_consistent() {
            for d in &report.drifts {
                warn!(user_id = %user, drift = %d, "ledger drift");
            }
        }
        Ok(report)
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<UserId>, TradeError> {
        Ok(self
            .store
            .find_user_by_username(username.trim())
            .await
            .map_err(|e| TradeError::from_store(e, None))?
            .map(|r| r.id))
    }
}

fn require_symbol(raw: &str) -> Result<String, TradeError> {
    normalize_symbol(raw).ok_or_else(|| TradeError::validation("must provide symbol"))
}

fn require_shares(raw: &str) -> Result<i64, TradeError> {
    parse_shares(raw).map_err(|e| match e {
        ParseSharesError::Missing => TradeError::validation("must provide number of shares"),
        other => TradeError::Validation(other.to_string()),
    })
}
