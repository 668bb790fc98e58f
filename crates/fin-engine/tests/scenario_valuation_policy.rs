//! Scenario: valuation fails as a whole when any holding cannot be priced,
//! and a stalled provider is cut off by the lookup timeout.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fin_engine::{Engine, EngineConfig, MemoryStore, TradeError};
use fin_portfolio::Micros;
use fin_quote::{Quote, QuoteError, QuoteProvider, StaticQuoteProvider};

/// Static table plus switchable failure modes per symbol.
#[derive(Default)]
struct FlakyProvider {
    table: StaticQuoteProvider,
    down: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
}

impl FlakyProvider {
    fn take_down(&self, sym: &str) {
        self.down.lock().unwrap().insert(sym.to_string());
    }

    fn stall(&self, sym: &str) {
        self.stalled.lock().unwrap().insert(sym.to_string());
    }
}

#[async_trait::async_trait]
impl QuoteProvider for FlakyProvider {
    fn source_name(&self) -> &'static str {
        "flaky"
    }

    async fn lookup(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let down = self.down.lock().unwrap().contains(symbol);
        if down {
            return Err(QuoteError::Unavailable("upstream 503".to_string()));
        }
        let stalled = self.stalled.lock().unwrap().contains(symbol);
        if stalled {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.table.lookup(symbol).await
    }
}

fn setup() -> (Engine, Arc<FlakyProvider>) {
    let p = FlakyProvider::default();
    p.table.set_quote("AAPL", "Apple Inc.", Micros::from_dollars(100).unwrap());
    p.table.set_quote("MSFT", "Microsoft", Micros::from_dollars(200).unwrap());
    let p = Arc::new(p);
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        p.clone(),
        EngineConfig {
            quote_timeout: Duration::from_millis(100),
            password_iterations: 4,
            ..EngineConfig::default()
        },
    );
    (engine, p)
}

#[tokio::test]
async fn one_unavailable_quote_fails_the_valuation() {
    let (engine, p) = setup();
    let u = engine.register("v", "pw", "pw").await.unwrap();
    engine.buy(u, "AAPL", "1").await.unwrap();
    engine.buy(u, "MSFT", "1").await.unwrap();

    assert_eq!(engine.portfolio(u).await.unwrap().positions.len(), 2);

    p.take_down("MSFT");
    let err = engine.portfolio(u).await.unwrap_err();
    assert!(matches!(err, TradeError::Unavailable(_)), "got {err}");
}

#[tokio::test]
async fn stalled_lookup_times_out_as_unavailable() {
    let (engine, p) = setup();
    let u = engine.register("s", "pw", "pw").await.unwrap();
    engine.buy(u, "AAPL", "1").await.unwrap();

    p.stall("AAPL");
    let err = engine.portfolio(u).await.unwrap_err();
    assert_eq!(err.kind(), "UNAVAILABLE");
    assert!(err.to_string().contains("timed out"), "got {err}");

    // Trades are refused the same way and leave cash untouched.
    let err = engine.buy(u, "AAPL", "1").await.unwrap_err();
    assert_eq!(err.kind(), "UNAVAILABLE");
    assert_eq!(engine.history(u).await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_portfolio_needs_no_lookups() {
    let (engine, p) = setup();
    let u = engine.register("e", "pw", "pw").await.unwrap();
    p.take_down("AAPL");
    p.take_down("MSFT");

    let v = engine.portfolio(u).await.unwrap();
    assert!(v.positions.is_empty());
    assert_eq!(v.total, v.cash);
}
