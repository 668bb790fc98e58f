//! Postgres [`Store`]. Every mutation runs in one transaction that first locks
//! the user row (`for update`), so concurrent trades for the same user are
//! serialised and a refused plan rolls back by dropping the transaction.

use anyhow::Context;
use fin_engine::{Store, StoreError, TradeReceipt, TransactionRow, UserId, UserRow};
use fin_portfolio::{plan_buy, plan_deposit, plan_sell, Holding, LogEntry, Micros, TxKind};
use fin_quote::Quote;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::debug;

use crate::{invalid_row, is_unique_constraint_violation};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn user_from_row(row: &PgRow) -> anyhow::Result<UserRow> {
    Ok(UserRow {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        cash: Micros::new(row.try_get("cash_micros")?),
        initial_cash: Micros::new(row.try_get("initial_cash_micros")?),
        created_at: row.try_get("created_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> anyhow::Result<TransactionRow> {
    let kind_s: String = row.try_get("kind")?;
    let kind = TxKind::parse(&kind_s).ok_or_else(|| invalid_row("transactions", &kind_s))?;
    Ok(TransactionRow {
        id: row.try_get("id")?,
        user_id: UserId(row.try_get("user_id")?),
        created_at: row.try_get("created_at")?,
        entry: LogEntry {
            kind,
            symbol: row.try_get("symbol")?,
            stock_name: row.try_get("stock_name")?,
            price: Micros::new(row.try_get("price_micros")?),
            shares: row.try_get("shares")?,
        },
    })
}

const USER_COLUMNS: &str =
    "id, username, password_hash, cash_micros, initial_cash_micros, created_at";

// ---------------------------------------------------------------------------
// In-transaction helpers
// ---------------------------------------------------------------------------

/// Lock the user row and return its cash balance.
async fn lock_user_cash(conn: &mut PgConnection, user: UserId) -> Result<Micros, StoreError> {
    let row: Option<(i64,)> =
        sqlx::query_as::<_, (i64,)>("select cash_micros from users where id = $1 for update")
            .bind(user.0)
            .fetch_optional(&mut *conn)
            .await
            .context("lock user row failed")?;
    match row {
        Some((cash,)) => Ok(Micros::new(cash)),
        None => Err(StoreError::UnknownUser(user)),
    }
}

async fn locked_shares(
    conn: &mut PgConnection,
    user: UserId,
    symbol: &str,
) -> Result<i64, StoreError> {
    let row: Option<(i64,)> = sqlx::query_as::<_, (i64,)>(
        "select shares from holdings where user_id = $1 and symbol = $2 for update",
    )
    .bind(user.0)
    .bind(symbol)
    .fetch_optional(&mut *conn)
    .await
    .context("lock holding row failed")?;
    Ok(row.map(|(n,)| n).unwrap_or(0))
}

async fn set_cash(conn: &mut PgConnection, user: UserId, cash: Micros) -> Result<(), StoreError> {
    sqlx::query("update users set cash_micros = $2 where id = $1")
        .bind(user.0)
        .bind(cash.raw())
        .execute(&mut *conn)
        .await
        .context("update cash failed")?;
    Ok(())
}

async fn set_shares(
    conn: &mut PgConnection,
    user: UserId,
    symbol: &str,
    shares: i64,
) -> Result<(), StoreError> {
    if shares == 0 {
        sqlx::query("delete from holdings where user_id = $1 and symbol = $2")
            .bind(user.0)
            .bind(symbol)
            .execute(&mut *conn)
            .await
            .context("delete holding failed")?;
    } else {
        sqlx::query(
            r#"
            insert into holdings (user_id, symbol, shares)
            values ($1, $2, $3)
            on conflict (user_id, symbol) do update set shares = excluded.shares
            "#,
        )
        .bind(user.0)
        .bind(symbol)
        .bind(shares)
        .execute(&mut *conn)
        .await
        .context("upsert holding failed")?;
    }
    Ok(())
}

async fn append_log(
    conn: &mut PgConnection,
    user: UserId,
    entry: &LogEntry,
) -> Result<i64, StoreError> {
    let (id,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        insert into transactions (user_id, kind, symbol, stock_name, price_micros, shares)
        values ($1, $2, $3, $4, $5, $6)
        returning id
        "#,
    )
    .bind(user.0)
    .bind(entry.kind.as_str())
    .bind(entry.symbol.as_deref())
    .bind(entry.stock_name.as_deref())
    .bind(entry.price.raw())
    .bind(entry.shares)
    .fetch_one(&mut *conn)
    .await
    .context("append transaction failed")?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Store impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl Store for PgStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        initial_cash: Micros,
    ) -> Result<UserId, StoreError> {
        let res = sqlx::query_as::<_, (i64,)>(
            r#"
            insert into users (username, password_hash, cash_micros, initial_cash_micros)
            values ($1, $2, $3, $3)
            returning id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(initial_cash.raw())
        .fetch_one(&self.pool)
        .await;

        match res {
            Ok((id,)) => Ok(UserId(id)),
            Err(e) if is_unique_constraint_violation(&e, "uq_users_username") => {
                Err(StoreError::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(anyhow::Error::new(e).context("create_user insert failed").into()),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        let row = sqlx::query(&format!("select {USER_COLUMNS} from users where username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("find_user_by_username failed")?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn fetch_user(&self, user: UserId) -> Result<UserRow, StoreError> {
        let row = sqlx::query(&format!("select {USER_COLUMNS} from users where id = $1"))
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await
            .context("fetch_user failed")?;
        match row {
            Some(r) => Ok(user_from_row(&r)?),
            None => Err(StoreError::UnknownUser(user)),
        }
    }

    async fn holdings(&self, user: UserId) -> Result<Vec<Holding>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "select symbol, shares from holdings where user_id = $1 order by symbol",
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .context("holdings query failed")?;
        Ok(rows
            .into_iter()
            .map(|(symbol, shares)| Holding::new(symbol, shares))
            .collect())
    }

    async fn history(&self, user: UserId) -> Result<Vec<TransactionRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            select id, user_id, kind, symbol, stock_name, price_micros, shares, created_at
            from transactions
            where user_id = $1
            order by id
            "#,
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .context("history query failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            out.push(transaction_from_row(r)?);
        }
        Ok(out)
    }

    async fn execute_buy(
        &self,
        user: UserId,
        quote: &Quote,
        shares: i64,
    ) -> Result<TradeReceipt, StoreError> {
        let mut tx = self.pool.begin().await.context("buy begin failed")?;

        let cash = lock_user_cash(&mut tx, user).await?;
        let owned = locked_shares(&mut tx, user, &quote.symbol).await?;
        let plan = plan_buy(cash, owned, quote.price, shares)?;

        set_cash(&mut tx, user, plan.cash_after).await?;
        set_shares(&mut tx, user, &quote.symbol, plan.shares_after).await?;
        let tx_id = append_log(
            &mut tx,
            user,
            &LogEntry::buy(&quote.symbol, &quote.name, quote.price, shares),
        )
        .await?;

        tx.commit().await.context("buy commit failed")?;
        debug!(user_id = %user, tx_id, "buy committed");

        Ok(TradeReceipt {
            transaction_id: tx_id,
            kind: TxKind::Buy,
            symbol: quote.symbol.clone(),
            name: quote.name.clone(),
            shares,
            price: quote.price,
            total: plan.total,
            cash_after: plan.cash_after,
            shares_after: plan.shares_after,
        })
    }

    async fn execute_sell(
        &self,
        user: UserId,
        quote: &Quote,
        shares: i64,
    ) -> Result<TradeReceipt, StoreError> {
        let mut tx = self.pool.begin().await.context("sell begin failed")?;

        let cash = lock_user_cash(&mut tx, user).await?;
        let owned = locked_shares(&mut tx, user, &quote.symbol).await?;
        let plan = plan_sell(cash, owned, quote.price, shares)?;

        set_cash(&mut tx, user, plan.cash_after).await?;
        set_shares(&mut tx, user, &quote.symbol, plan.shares_after).await?;
        let tx_id = append_log(
            &mut tx,
            user,
            &LogEntry::sell(&quote.symbol, &quote.name, quote.price, shares),
        )
        .await?;

        tx.commit().await.context("sell commit failed")?;
        debug!(user_id = %user, tx_id, "sell committed");

        Ok(TradeReceipt {
            transaction_id: tx_id,
            kind: TxKind::Sell,
            symbol: quote.symbol.clone(),
            name: quote.name.clone(),
            shares,
            price: quote.price,
            total: plan.total,
            cash_after: plan.cash_after,
            shares_after: plan.shares_after,
        })
    }

    async fn execute_deposit(&self, user: UserId, amount: Micros) -> Result<Micros, StoreError> {
        let mut tx = self.pool.begin().await.context("deposit begin failed")?;

        let cash = lock_user_cash(&mut tx, user).await?;
        let cash_after = plan_deposit(cash, amount)?;

        set_cash(&mut tx, user, cash_after).await?;
        let tx_id = append_log(&mut tx, user, &LogEntry::deposit(amount)).await?;

        tx.commit().await.context("deposit commit failed")?;
        debug!(user_id = %user, tx_id, "deposit committed");
        Ok(cash_after)
    }
}
