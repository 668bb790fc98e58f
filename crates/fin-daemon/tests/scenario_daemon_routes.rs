//! Scenario: the full HTTP surface, in-process.
//!
//! Every test builds a router over `MemoryStore` and a fixed quote table, so
//! no DB or network is required.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Request, StatusCode};
use fin_daemon::{auth::TokenKeys, routes, state::AppState};
use fin_engine::{Engine, EngineConfig, MemoryStore};
use fin_portfolio::Micros;
use fin_quote::{Quote, QuoteError, QuoteProvider, StaticQuoteProvider};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot

const SECRET: &[u8] = b"route-test-secret-route-test-secret";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dollars(d: i64) -> Micros {
    Micros::from_dollars(d).unwrap()
}

fn state_with(quotes: Arc<dyn QuoteProvider>) -> Arc<AppState> {
    let cfg = EngineConfig {
        initial_cash: dollars(10_000),
        quote_timeout: Duration::from_millis(200),
        password_iterations: 1,
    };
    let engine = Engine::new(Arc::new(MemoryStore::new()), quotes, cfg);
    Arc::new(AppState::new(
        engine,
        TokenKeys::new(SECRET, 3600),
        "test-hash".to_string(),
    ))
}

fn default_state() -> Arc<AppState> {
    let quotes = StaticQuoteProvider::new()
        .with_quote("AAPL", "Apple Inc", dollars(100))
        .with_quote("NFLX", "Netflix Inc", dollars(400));
    state_with(Arc::new(quotes))
}

async fn call(
    st: &Arc<AppState>,
    req: Request<axum::body::Body>,
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = routes::build_router(Arc::clone(st))
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body: bytes::Bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("body is not valid JSON")
    };
    (status, headers, json)
}

fn get(uri: &str, token: Option<&str>) -> Request<axum::body::Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    b.body(axum::body::Body::empty()).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<axum::body::Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    b.body(axum::body::Body::from(body.to_string())).unwrap()
}

async fn register(st: &Arc<AppState>, username: &str) -> String {
    let (status, _, body) = call(
        st,
        post(
            "/v1/auth/register",
            None,
            json!({"username": username, "password": "pw", "confirmation": "pw"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

struct DownProvider;

#[async_trait::async_trait]
impl QuoteProvider for DownProvider {
    fn source_name(&self) -> &'static str {
        "down"
    }

    async fn lookup(&self, _symbol: &str) -> Result<Quote, QuoteError> {
        Err(QuoteError::Unavailable("connection refused".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_service_and_config_hash() {
    let st = default_state();
    let (status, _, body) = call(&st, get("/v1/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "fin-daemon");
    assert_eq!(body["quote_source"], "static");
    assert_eq!(body["config_hash"], "test-hash");
}

#[tokio::test]
async fn responses_are_never_cached() {
    let st = default_state();
    let (_, headers, _) = call(&st, get("/v1/health", None)).await;

    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers.get(header::EXPIRES).unwrap(), "0");
    assert_eq!(headers.get(header::PRAGMA).unwrap(), "no-cache");
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_then_login_issues_tokens() {
    let st = default_state();
    register(&st, "alice").await;

    let (status, _, body) = call(
        &st,
        post(
            "/v1/auth/login",
            None,
            json!({"username": "alice", "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let st = default_state();
    register(&st, "alice").await;

    let (status, _, body) = call(
        &st,
        post(
            "/v1/auth/register",
            None,
            json!({"username": "alice", "password": "x", "confirmation": "x"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "DUPLICATE_USERNAME");
}

#[tokio::test]
async fn wrong_password_is_401() {
    let st = default_state();
    register(&st, "alice").await;

    let (status, _, body) = call(
        &st,
        post(
            "/v1/auth/login",
            None,
            json!({"username": "alice", "password": "nope"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "AUTHENTICATION");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let st = default_state();

    let (status, _, _) = call(&st, get("/v1/portfolio", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = call(&st, get("/v1/portfolio", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenKeys::new(b"some-other-secret-some-other-secret", 60)
        .issue(fin_engine::UserId(1))
        .unwrap();
    let (status, _, _) = call(&st, get("/v1/history", Some(&foreign))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn buy_sell_deposit_and_history_round() {
    let st = default_state();
    let token = register(&st, "alice").await;
    let t = Some(token.as_str());

    let (status, _, body) = call(&st, get("/v1/quote/aapl", t)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["price_usd"], "$100.00");

    let (status, _, body) = call(
        &st,
        post("/v1/buy", t, json!({"symbol": "aapl", "shares": "10"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["kind"], "buy");
    assert_eq!(body["shares_owned"], 10);
    assert_eq!(body["cash_usd"], "$9,000.00");

    // Numeric shares are accepted as well.
    let (status, _, body) = call(
        &st,
        post("/v1/sell", t, json!({"symbol": "AAPL", "shares": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["shares_owned"], 6);
    assert_eq!(body["cash_usd"], "$9,400.00");

    let (status, _, body) = call(
        &st,
        post(
            "/v1/cash",
            t,
            json!({"amount": "100.50", "card": "4111 1111 1111 1111"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["amount_usd"], "$100.50");
    assert_eq!(body["cash_usd"], "$9,500.50");

    let (status, _, body) = call(&st, get("/v1/portfolio", t)).await;
    assert_eq!(status, StatusCode::OK);
    let positions = body["positions"].as_array().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0]["symbol"], "AAPL");
    assert_eq!(positions[0]["shares"], 6);
    assert_eq!(body["holdings_value_usd"], "$600.00");
    assert_eq!(body["total_usd"], "$10,100.50");

    let (status, _, body) = call(&st, get("/v1/history", t)).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["buy", "sell", "deposit"]);
}

#[tokio::test]
async fn refusals_map_to_400_with_stable_kinds() {
    let st = default_state();
    let token = register(&st, "alice").await;
    let t = Some(token.as_str());

    let cases = [
        ("/v1/buy", json!({"symbol": "NFLX", "shares": "26"}), "INSUFFICIENT_FUNDS"),
        ("/v1/sell", json!({"symbol": "AAPL", "shares": "1"}), "INSUFFICIENT_SHARES"),
        ("/v1/buy", json!({"symbol": "AAPL", "shares": "1.5"}), "VALIDATION"),
        ("/v1/buy", json!({"symbol": "AAPL", "shares": "-3"}), "VALIDATION"),
        ("/v1/buy", json!({"symbol": "ZZZZ", "shares": "1"}), "NOT_FOUND"),
        ("/v1/buy", json!({"shares": "1"}), "VALIDATION"),
        (
            "/v1/cash",
            json!({"amount": "10", "card": "4111111111111112"}),
            "INVALID_CARD",
        ),
        (
            "/v1/cash",
            json!({"amount": "0", "card": "4111111111111111"}),
            "VALIDATION",
        ),
    ];

    for (uri, body, kind) in cases {
        let (status, _, resp) = call(&st, post(uri, t, body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body} -> {resp}");
        assert_eq!(resp["kind"], kind, "{uri} {body}");
    }

    // Nothing above touched the balance.
    let (_, _, body) = call(&st, get("/v1/portfolio", t)).await;
    assert_eq!(body["cash_usd"], "$10,000.00");
}

#[tokio::test]
async fn malformed_json_is_400() {
    let st = default_state();
    let req = Request::builder()
        .method("POST")
        .uri("/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, _, body) = call(&st, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "VALIDATION");
}

#[tokio::test]
async fn quote_outage_is_503() {
    let st = state_with(Arc::new(DownProvider));
    let token = register(&st, "alice").await;

    let (status, _, body) = call(&st, get("/v1/quote/AAPL", Some(&token))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "UNAVAILABLE");

    let (status, _, _) = call(
        &st,
        post(
            "/v1/buy",
            Some(&token),
            json!({"symbol": "AAPL", "shares": "1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
