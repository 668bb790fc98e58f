//! In-process [`Store`]. One async mutex guards all three stores, so every
//! check-and-apply is trivially atomic. State is lost when the process exits.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use fin_portfolio::{plan_buy, plan_deposit, plan_sell, Holding, LogEntry, Micros, TxKind};
use fin_quote::Quote;
use tokio::sync::Mutex;

use crate::store::{Store, StoreError, TradeReceipt, TransactionRow, UserId, UserRow};

#[derive(Default)]
struct Inner {
    /// Indexed by `UserId.0 - 1`.
    users: Vec<UserRow>,
    by_name: HashMap<String, UserId>,
    holdings: BTreeMap<(UserId, String), i64>,
    log: Vec<TransactionRow>,
}

impl Inner {
    fn user(&self, id: UserId) -> Result<&UserRow, StoreError> {
        usize::try_from(id.0 - 1)
            .ok()
            .and_then(|i| self.users.get(i))
            .ok_or(StoreError::UnknownUser(id))
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut UserRow, StoreError> {
        usize::try_from(id.0 - 1)
            .ok()
            .and_then(|i| self.users.get_mut(i))
            .ok_or(StoreError::UnknownUser(id))
    }

    fn owned(&self, id: UserId, symbol: &str) -> i64 {
        self.holdings
            .get(&(id, symbol.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn set_holding(&mut self, id: UserId, symbol: &str, shares: i64) {
        let key = (id, symbol.to_string());
        if shares == 0 {
            self.holdings.remove(&key);
        } else {
            self.holdings.insert(key, shares);
        }
    }

    fn append(&mut self, user_id: UserId, entry: LogEntry) -> i64 {
        let id = self.log.len() as i64 + 1;
        self.log.push(TransactionRow {
            id,
            user_id,
            created_at: Utc::now(),
            entry,
        });
        id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        initial_cash: Micros,
    ) -> Result<UserId, StoreError> {
        let mut g = self.inner.lock().await;
        if g.by_name.contains_key(username) {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }
        let id = UserId(g.users.len() as i64 + 1);
        g.users.push(UserRow {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            cash: initial_cash,
            initial_cash,
            created_at: Utc::now(),
        });
        g.by_name.insert(username.to_string(), id);
        Ok(id)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        let g = self.inner.lock().await;
        match g.by_name.get(username) {
            Some(id) => Ok(Some(g.user(*id)?.clone())),
            None => Ok(None),
        }
    }

    async fn fetch_user(&self, user: UserId) -> Result<UserRow, StoreError> {
        let g = self.inner.lock().await;
        g.user(user).cloned()
    }

    async fn holdings(&self, user: UserId) -> Result<Vec<Holding>, StoreError> {
        let g = self.inner.lock().await;
        g.user(user)?;
        Ok(g.holdings
            .iter()
            .filter(|((uid, _), _)| *uid == user)
            .map(|((_, sym), shares)| Holding::new(sym.clone(), *shares))
            .collect())
    }

    async fn history(&self, user: UserId) -> Result<Vec<TransactionRow>, StoreError> {
        let g = self.inner.lock().await;
        g.user(user)?;
        Ok(g.log.iter().filter(|t| t.user_id == user).cloned().collect())
    }

    async fn execute_buy(
        &self,
        user: UserId,
        quote: &Quote,
        shares: i64,
    ) -> Result<TradeReceipt, StoreError> {
        let mut g = self.inner.lock().await;
        let cash = g.user(user)?.cash;
        let owned = g.owned(user, &quote.symbol);

        let plan = plan_buy(cash, owned, quote.price, shares)?;

        g.user_mut(user)?.cash = plan.cash_after;
        g.set_holding(user, &quote.symbol, plan.shares_after);
        let tx_id = g.append(
            user,
            LogEntry::buy(&quote.symbol, &quote.name, quote.price, shares),
        );

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
        let mut g = self.inner.lock().await;
        let cash = g.user(user)?.cash;
        let owned = g.owned(user, &quote.symbol);

        let plan = plan_sell(cash, owned, quote.price, shares)?;

        g.user_mut(user)?.cash = plan.cash_after;
        g.set_holding(user, &quote.symbol, plan.shares_after);
        let tx_id = g.append(
            user,
            LogEntry::sell(&quote.symbol, &quote.name, quote.price, shares),
        );

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
        let mut g = self.inner.lock().await;
        let cash = g.user(user)?.cash;

        let cash_after = plan_deposit(cash, amount)?;

        g.user_mut(user)?.cash = cash_after;
        g.append(user, LogEntry::deposit(amount));
        Ok(cash_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(sym: &str, dollars: i64) -> Quote {
        Quote {
            name: format!("{sym} Corp"),
            symbol: sym.to_string(),
            price: Micros::from_dollars(dollars).unwrap(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_refused() {
        let s = MemoryStore::new();
        s.create_user("alice", "h", Micros::ZERO).await.unwrap();
        assert!(matches!(
            s.create_user("alice", "h2", Micros::ZERO).await,
            Err(StoreError::DuplicateUsername(n)) if n == "alice"
        ));
    }

    #[tokio::test]
    async fn rejected_buy_writes_nothing() {
        let s = MemoryStore::new();
        let u = s
            .create_user("bob", "h", Micros::from_dollars(50).unwrap())
            .await
            .unwrap();

        let r = s.execute_buy(u, &quote("AAPL", 100), 1).await;
        assert!(matches!(r, Err(StoreError::Rejected(_))));

        assert_eq!(s.fetch_user(u).await.unwrap().cash, Micros::from_dollars(50).unwrap());
        assert!(s.holdings(u).await.unwrap().is_empty());
        assert!(s.history(u).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_sell_removes_holding() {
        let s = MemoryStore::new();
        let u = s
            .create_user("carol", "h", Micros::from_dollars(1000).unwrap())
            .await
            .unwrap();
        s.execute_buy(u, &quote("NFLX", 10), 4).await.unwrap();
        let r = s.execute_sell(u, &quote("NFLX", 12), 4).await.unwrap();

        assert_eq!(r.shares_after, 0);
        assert_eq!(r.cash_after, Micros::from_dollars(1008).unwrap());
        assert!(s.holdings(u).await.unwrap().is_empty());
        assert_eq!(s.history(u).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn users_do_not_see_each_other() {
        let s = MemoryStore::new();
        let a = s.create_user("a", "h", Micros::from_dollars(100).unwrap()).await.unwrap();
        let b = s.create_user("b", "h", Micros::from_dollars(100).unwrap()).await.unwrap();
        s.execute_buy(a, &quote("AAPL", 1), 3).await.unwrap();

        assert!(s.holdings(b).await.unwrap().is_empty());
        assert!(s.history(b).await.unwrap().is_empty());
        assert!(matches!(
            s.fetch_user(UserId(99)).await,
            Err(StoreError::UnknownUser(UserId(99)))
        ));
    }
}
