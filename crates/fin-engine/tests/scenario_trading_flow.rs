//! Scenario: register → buy → sell → deposit against the in-process store,
//! checking every store after each step.

use std::sync::Arc;

use fin_engine::{Engine, EngineConfig, MemoryStore, TradeError, UserId};
use fin_portfolio::{Micros, TxKind};
use fin_quote::StaticQuoteProvider;

fn usd(s: &str) -> Micros {
    Micros::parse_decimal(s).unwrap()
}

fn setup() -> (Engine, Arc<StaticQuoteProvider>) {
    let quotes = Arc::new(
        StaticQuoteProvider::new()
            .with_quote("AAPL", "Apple Inc.", usd("100"))
            .with_quote("NFLX", "Netflix, Inc.", usd("401.10")),
    );
    let cfg = EngineConfig {
        initial_cash: usd("10000"),
        password_iterations: 8,
        ..EngineConfig::default()
    };
    let engine = Engine::new(Arc::new(MemoryStore::new()), quotes.clone(), cfg);
    (engine, quotes)
}

async fn user(engine: &Engine, name: &str) -> UserId {
    engine.register(name, "pw", "pw").await.unwrap()
}

async fn cash(engine: &Engine, u: UserId) -> Micros {
    engine.portfolio(u).await.unwrap().cash
}

#[tokio::test]
async fn worked_example_buy_ten_at_one_hundred() {
    let (engine, _) = setup();
    let u = user(&engine, "alice").await;

    let r = engine.buy(u, "aapl", "10").await.unwrap();
    assert_eq!(r.symbol, "AAPL");
    assert_eq!(r.total, usd("1000"));
    assert_eq!(r.cash_after, usd("9000"));
    assert_eq!(r.shares_after, 10);

    let v = engine.portfolio(u).await.unwrap();
    assert_eq!(v.cash, usd("9000"));
    assert_eq!(v.positions.len(), 1);
    assert_eq!(v.positions[0].shares, 10);
    assert_eq!(v.total, usd("10000"));

    let h = engine.history(u).await.unwrap();
    assert_eq!(h.len(), 1);
    assert_eq!(h[0].entry.kind, TxKind::Buy);
    assert_eq!(h[0].entry.shares, Some(10));
    assert_eq!(h[0].entry.price, usd("100"));
    assert_eq!(h[0].entry.stock_name.as_deref(), Some("Apple Inc."));
}

#[tokio::test]
async fn buy_input_validation() {
    let (engine, _) = setup();
    let u = user(&engine, "bob").await;

    for (sym, shares) in [
        ("", "1"),
        ("  ", "1"),
        ("AAPL", ""),
        ("AAPL", "abc"),
        ("AAPL", "0"),
        ("AAPL", "-3"),
        ("AAPL", "1.5"),
    ] {
        let err = engine.buy(u, sym, shares).await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION", "({sym:?}, {shares:?}) gave {err}");
    }

    let err = engine.buy(u, "ZZZZ", "1").await.unwrap_err();
    assert!(matches!(err, TradeError::NotFound(_)), "got {err}");

    assert!(engine.history(u).await.unwrap().is_empty());
}

#[tokio::test]
async fn insufficient_funds_changes_nothing() {
    let (engine, _) = setup();
    let u = user(&engine, "carol").await;

    let err = engine.buy(u, "AAPL", "101").await.unwrap_err();
    assert!(
        matches!(err, TradeError::InsufficientFunds { required, available }
            if required == usd("10100") && available == usd("10000")),
        "got {err}"
    );
    assert_eq!(cash(&engine, u).await, usd("10000"));
    assert!(engine.portfolio(u).await.unwrap().positions.is_empty());
    assert!(engine.history(u).await.unwrap().is_empty());
}

#[tokio::test]
async fn sell_partial_then_full() {
    let (engine, quotes) = setup();
    let u = user(&engine, "dave").await;
    engine.buy(u, "AAPL", "10").await.unwrap();

    quotes.set_quote("AAPL", "Apple Inc.", usd("110"));
    let r = engine.sell(u, "AAPL", "4").await.unwrap();
    assert_eq!(r.shares_after, 6);
    assert_eq!(r.total, usd("440"));
    assert_eq!(r.cash_after, usd("9440"));

    let r = engine.sell(u, "AAPL", "6").await.unwrap();
    assert_eq!(r.shares_after, 0);
    assert!(engine.portfolio(u).await.unwrap().positions.is_empty());
    assert_eq!(cash(&engine, u).await, usd("10100"));
}

#[tokio::test]
async fn oversell_is_refused_and_changes_nothing() {
    let (engine, _) = setup();
    let u = user(&engine, "erin").await;
    engine.buy(u, "AAPL", "3").await.unwrap();

    let err = engine.sell(u, "AAPL", "4").await.unwrap_err();
    assert!(
        matches!(&err, TradeError::InsufficientShares { symbol, requested: 4, owned: 3 } if symbol == "AAPL"),
        "got {err}"
    );

    let err = engine.sell(u, "NFLX", "1").await.unwrap_err();
    assert!(matches!(err, TradeError::InsufficientShares { owned: 0, .. }));

    assert_eq!(cash(&engine, u).await, usd("9700"));
    assert_eq!(engine.history(u).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deposit_validates_amount_then_card() {
    let (engine, _) = setup();
    let u = user(&engine, "frank").await;

    let r = engine.deposit(u, "250.50", "4242 4242 4242 4242").await.unwrap();
    assert_eq!(r.brand, fin_card::CardBrand::Visa);
    assert_eq!(r.amount, usd("250.50"));
    assert_eq!(r.balance, usd("10250.50"));

    for amount in ["", "0", "-5", "abc", "1.1234567"] {
        let err = engine.deposit(u, amount, "4242424242424242").await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION", "amount {amount:?} gave {err}");
    }
    let err = engine.deposit(u, "10", "").await.unwrap_err();
    assert_eq!(err.kind(), "VALIDATION");

    for card in ["4242424242424241", "6011111111111117", "42x2"] {
        let err = engine.deposit(u, "10", card).await.unwrap_err();
        assert_eq!(err.kind(), "INVALID_CARD", "card {card:?} gave {err}");
    }

    let h = engine.history(u).await.unwrap();
    assert_eq!(h.len(), 1);
    assert_eq!(h[0].entry.kind, TxKind::Deposit);
    assert_eq!(h[0].entry.symbol, None);
    assert_eq!(h[0].entry.price, usd("250.50"));
    assert_eq!(cash(&engine, u).await, usd("10250.50"));
}

#[tokio::test]
async fn accounts_register_and_login() {
    let (engine, _) = setup();
    let id = engine.register("  grace ", "s3cret", "s3cret").await.unwrap();
    assert_eq!(engine.authenticate("grace", "s3cret").await.unwrap(), id);

    assert!(matches!(
        engine.register("grace", "x", "x").await,
        Err(TradeError::DuplicateUsername(_))
    ));
    assert_eq!(
        engine.register("heidi", "a", "b").await.unwrap_err().kind(),
        "VALIDATION"
    );
    assert_eq!(
        engine.register("", "a", "a").await.unwrap_err().kind(),
        "VALIDATION"
    );

    let wrong = engine.authenticate("grace", "nope").await.unwrap_err();
    let unknown = engine.authenticate("nobody", "s3cret").await.unwrap_err();
    assert!(matches!(wrong, TradeError::Authentication));
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[tokio::test]
async fn history_and_audit_after_mixed_activity() {
    let (engine, quotes) = setup();
    let u = user(&engine, "ivan").await;

    engine.buy(u, "AAPL", "12").await.unwrap();
    engine.buy(u, "NFLX", "3").await.unwrap();
    engine.deposit(u, "99.99", "5555555555554444").await.unwrap();
    quotes.set_quote("AAPL", "Apple Inc.", usd("101.25"));
    engine.sell(u, "AAPL", "5").await.unwrap();

    let h = engine.history(u).await.unwrap();
    let kinds: Vec<_> = h.iter().map(|t| t.entry.kind).collect();
    assert_eq!(kinds, vec![TxKind::Buy, TxKind::Buy, TxKind::Deposit, TxKind::Sell]);
    assert!(h.windows(2).all(|w| w[0].id < w[1].id));

    let report = engine.audit(u).await.unwrap();
    assert!(report.is_consistent(), "drifts: {:?}", report.drifts);

    let v = engine.portfolio(u).await.unwrap();
    let symbols: Vec<_> = v.positions.iter().map(|p| p.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AAPL", "NFLX"]);
    assert_eq!(v.holdings_value, usd("101.25").checked_mul_qty(7).unwrap() + usd("1203.30"));
    assert_eq!(v.total, v.holdings_value + v.cash);
}
