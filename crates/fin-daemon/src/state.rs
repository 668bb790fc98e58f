//! Shared state for fin-daemon handlers, plus the boot wiring that turns a
//! loaded config into one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fin_config::secrets::ResolvedSecrets;
use fin_config::{AppConfig, DatabaseBackend, QuoteProviderKind};
use fin_engine::{Engine, EngineConfig, MemoryStore, Store};
use fin_quote::{IexQuoteProvider, QuoteProvider, StaticQuoteProvider};
use tracing::{info, warn};

use crate::auth::TokenKeys;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "fin-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Handed to every handler as `State<Arc<AppState>>`.
pub struct AppState {
    pub build: BuildInfo,
    pub engine: Engine,
    pub tokens: TokenKeys,
    pub config_hash: String,
}

impl AppState {
    pub fn new(engine: Engine, tokens: TokenKeys, config_hash: String) -> Self {
        Self {
            build: BuildInfo::default(),
            engine,
            tokens,
            config_hash,
        }
    }
}

/// Build the quote provider named by `quotes.provider`.
pub fn build_quote_provider(
    cfg: &AppConfig,
    secrets: &ResolvedSecrets,
) -> Result<Arc<dyn QuoteProvider>> {
    match cfg.quotes.provider {
        QuoteProviderKind::Iex => {
            let token = secrets.quote_api_key.clone().with_context(|| {
                format!("quote token env var '{}' not set", cfg.quotes.api_key_env)
            })?;
            Ok(Arc::new(IexQuoteProvider::new_with_base_url(
                token,
                cfg.quotes.base_url.clone(),
            )))
        }
        QuoteProviderKind::Static => {
            let p = StaticQuoteProvider::new();
            for (sym, q) in &cfg.quotes.static_quotes {
                p.set_quote(sym, &q.name, q.price.0);
            }
            Ok(Arc::new(p))
        }
    }
}

/// Build the store named by `database.backend`; Postgres is migrated first.
pub async fn build_store(cfg: &AppConfig, secrets: &ResolvedSecrets) -> Result<Arc<dyn Store>> {
    match cfg.database.backend {
        DatabaseBackend::Postgres => {
            let url = secrets.database_url.as_deref().with_context(|| {
                format!("database url env var '{}' not set", cfg.database.url_env)
            })?;
            let pool = fin_db::connect(url).await?;
            fin_db::migrate(&pool).await?;
            info!("postgres store ready");
            Ok(Arc::new(fin_db::PgStore::new(pool)))
        }
        DatabaseBackend::Memory => {
            warn!("using in-memory store; all accounts are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub fn engine_config(cfg: &AppConfig) -> EngineConfig {
    EngineConfig {
        initial_cash: cfg.accounts.initial_cash.0,
        quote_timeout: Duration::from_millis(cfg.quotes.timeout_ms),
        password_iterations: cfg.auth.password_iterations,
    }
}

/// Everything `main` needs, from config and resolved secrets.
pub async fn build_state(
    cfg: &AppConfig,
    secrets: &ResolvedSecrets,
    config_hash: String,
) -> Result<AppState> {
    let jwt_secret = secrets
        .jwt_secret
        .as_deref()
        .with_context(|| format!("jwt secret env var '{}' not set", cfg.auth.jwt_secret_env))?;

    let quotes = build_quote_provider(cfg, secrets)?;
    let store = build_store(cfg, secrets).await?;
    let engine = Engine::new(store, quotes, engine_config(cfg));
    let tokens = TokenKeys::new(jwt_secret.as_bytes(), cfg.auth.token_ttl_secs);

    Ok(AppState::new(engine, tokens, config_hash))
}
