//! Scenario: many concurrent buys against one account never overdraw.

use std::sync::Arc;

use fin_engine::{Engine, EngineConfig, MemoryStore, TradeError};
use fin_portfolio::Micros;
use fin_quote::StaticQuoteProvider;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_buys_never_overdraw() {
    let quotes = StaticQuoteProvider::new().with_quote("AAPL", "Apple Inc.", Micros::from_dollars(100).unwrap());
    let engine = Arc::new(Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(quotes),
        EngineConfig {
            initial_cash: Micros::from_dollars(1_000).unwrap(),
            password_iterations: 4,
            ..EngineConfig::default()
        },
    ));
    let u = engine.register("racer", "pw", "pw").await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..25 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move { engine.buy(u, "AAPL", "1").await }));
    }

    let mut ok = 0;
    let mut refused = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => ok += 1,
            Err(TradeError::InsufficientFunds { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ok, 10);
    assert_eq!(refused, 15);

    let v = engine.portfolio(u).await.unwrap();
    assert_eq!(v.cash, Micros::ZERO);
    assert_eq!(v.positions[0].shares, 10);
    assert!(engine.audit(u).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_registrations_yield_one_account() {
    let engine = Arc::new(Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(StaticQuoteProvider::new()),
        EngineConfig {
            password_iterations: 4,
            ..EngineConfig::default()
        },
    ));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move { engine.register("same", "pw", "pw").await }));
    }

    let mut created = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e.kind(), "DUPLICATE_USERNAME"),
        }
    }
    assert_eq!(created, 1);
}
