//! Axum router and all HTTP handlers for fin-daemon.
//!
//! `build_router` is the single entry point. The no-cache headers are part of
//! the API contract and are attached here; tracing and CORS are attached in
//! `main.rs` so tests can use the bare router.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::{
    api_types::{
        raw_text, DepositRequest, DepositResponse, HealthResponse, HistoryItem, HistoryResponse,
        LoginRequest, PortfolioResponse, QuoteResponse, RegisterRequest, TokenResponse,
        TradeRequest, TradeResponse,
    },
    auth::AuthUser,
    error::ApiResult,
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route("/v1/quote/:symbol", get(quote))
        .route("/v1/portfolio", get(portfolio))
        .route("/v1/buy", post(buy))
        .route("/v1/sell", post(sell))
        .route("/v1/cash", post(cash))
        .route("/v1/history", get(history))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            quote_source: st.engine.quote_source().to_string(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/auth/register  /v1/auth/login
// ---------------------------------------------------------------------------

pub(crate) async fn register(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let Json(req) = payload?;
    let id = st
        .engine
        .register(&req.username, &req.password, &req.confirmation)
        .await?;
    let token = st.tokens.issue(id)?;
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            user_id: id.0,
            token,
            token_type: "Bearer".to_string(),
            expires_in: st.tokens.ttl_secs(),
        }),
    ))
}

pub(crate) async fn login(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Json(req) = payload?;
    let id = st.engine.authenticate(&req.username, &req.password).await?;
    let token = st.tokens.issue(id)?;
    info!(user_id = %id, "login");
    Ok(Json(TokenResponse {
        user_id: id.0,
        token,
        token_type: "Bearer".to_string(),
        expires_in: st.tokens.ttl_secs(),
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/quote/:symbol
// ---------------------------------------------------------------------------

pub(crate) async fn quote(
    State(st): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(symbol): Path<String>,
) -> ApiResult<Json<QuoteResponse>> {
    let q = st.engine.quote(&symbol).await?;
    Ok(Json(q.into()))
}

// ---------------------------------------------------------------------------
// GET /v1/portfolio
// ---------------------------------------------------------------------------

pub(crate) async fn portfolio(
    State(st): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<PortfolioResponse>> {
    let v = st.engine.portfolio(user).await?;
    Ok(Json(v.into()))
}

// ---------------------------------------------------------------------------
// POST /v1/buy  /v1/sell
// ---------------------------------------------------------------------------

pub(crate) async fn buy(
    State(st): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> ApiResult<Json<TradeResponse>> {
    let Json(req) = payload?;
    let receipt = st
        .engine
        .buy(user, &req.symbol, &raw_text(&req.shares))
        .await?;
    Ok(Json(receipt.into()))
}

pub(crate) async fn sell(
    State(st): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> ApiResult<Json<TradeResponse>> {
    let Json(req) = payload?;
    let receipt = st
        .engine
        .sell(user, &req.symbol, &raw_text(&req.shares))
        .await?;
    Ok(Json(receipt.into()))
}

// ---------------------------------------------------------------------------
// POST /v1/cash
// ---------------------------------------------------------------------------

pub(crate) async fn cash(
    State(st): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> ApiResult<Json<DepositResponse>> {
    let Json(req) = payload?;
    let receipt = st
        .engine
        .deposit(user, &raw_text(&req.amount), &raw_text(&req.card))
        .await?;
    Ok(Json(receipt.into()))
}

// ---------------------------------------------------------------------------
// GET /v1/history
// ---------------------------------------------------------------------------

pub(crate) async fn history(
    State(st): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<HistoryResponse>> {
    let rows = st.engine.history(user).await?;
    Ok(Json(HistoryResponse {
        transactions: rows.into_iter().map(HistoryItem::from).collect(),
    }))
}
