//! In-process quote table. Used for local runs without an upstream key and as
//! the deterministic provider in tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use fin_portfolio::Micros;

use crate::{Quote, QuoteError, QuoteProvider};

#[derive(Debug, Default)]
pub struct StaticQuoteProvider {
    quotes: RwLock<BTreeMap<String, Quote>>,
}

impl StaticQuoteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set_quote`](Self::set_quote).
    pub fn with_quote(self, symbol: &str, name: &str, price: Micros) -> Self {
        self.set_quote(symbol, name, price);
        self
    }

    /// Insert or replace the quote for `symbol` (stored upper-cased).
    pub fn set_quote(&self, symbol: &str, name: &str, price: Micros) {
        let symbol = symbol.trim().to_ascii_uppercase();
        let quote = Quote {
            name: name.to_string(),
            symbol: symbol.clone(),
            price,
        };
        let mut map = self.quotes.write().unwrap_or_else(|e| e.into_inner());
        map.insert(symbol, quote);
    }

    pub fn remove_quote(&self, symbol: &str) {
        let mut map = self.quotes.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&symbol.trim().to_ascii_uppercase());
    }

    pub fn len(&self) -> usize {
        self.quotes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl QuoteProvider for StaticQuoteProvider {
    fn source_name(&self) -> &'static str {
        "static"
    }

    async fn lookup(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let map = self.quotes.read().unwrap_or_else(|e| e.into_inner());
        map.get(symbol).cloned().ok_or_else(|| QuoteError::NotFound {
            symbol: symbol.to_string(),
        })
    }
}
