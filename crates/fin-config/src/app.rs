use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};
use fin_portfolio::Micros;
use serde::Deserialize;

/// Typed view of the merged configuration. Every section has defaults, so an
/// empty document yields a usable (if secret-less) config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub accounts: AccountsConfig,
    pub quotes: QuotesConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server.addr.trim().is_empty() {
            bail!("CONFIG_INVALID server.addr must not be empty");
        }
        if self.accounts.initial_cash.0.is_negative() {
            bail!("CONFIG_INVALID accounts.initial_cash must not be negative");
        }
        if self.quotes.timeout_ms == 0 {
            bail!("CONFIG_INVALID quotes.timeout_ms must be > 0");
        }
        for (sym, q) in &self.quotes.static_quotes {
            if !q.price.0.is_positive() {
                bail!("CONFIG_INVALID quotes.static.{sym}.price must be > 0");
            }
        }
        if self.quotes.provider == QuoteProviderKind::Static && self.quotes.static_quotes.is_empty()
        {
            bail!("CONFIG_INVALID quotes.provider=static requires a non-empty quotes.static table");
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("CONFIG_INVALID auth.token_ttl_secs must be > 0");
        }
        if self.auth.password_iterations == 0 {
            bail!("CONFIG_INVALID auth.password_iterations must be > 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8899".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Cash seeded into every new account.
    pub initial_cash: Money,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            initial_cash: Money(Micros::new(10_000 * fin_portfolio::MICROS_PER_DOLLAR)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteProviderKind {
    #[default]
    Iex,
    Static,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotesConfig {
    pub provider: QuoteProviderKind,
    pub base_url: String,
    pub timeout_ms: u64,
    /// Env var NAME holding the upstream token.
    pub api_key_env: String,
    #[serde(rename = "static")]
    pub static_quotes: BTreeMap<String, StaticQuoteConfig>,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            provider: QuoteProviderKind::Iex,
            base_url: "https://cloud.iexapis.com/stable".to_string(),
            timeout_ms: 5_000,
            api_key_env: "FIN_IEX_API_KEY".to_string(),
            static_quotes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticQuoteConfig {
    pub name: String,
    pub price: Money,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Env var NAME holding the HS256 signing secret.
    pub jwt_secret_env: String,
    pub token_ttl_secs: u64,
    pub password_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: "FIN_JWT_SECRET".to_string(),
            token_ttl_secs: 24 * 60 * 60,
            password_iterations: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    /// In-process store; state is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// Env var NAME holding the connection URL.
    pub url_env: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Postgres,
            url_env: "FIN_DATABASE_URL".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Money in YAML
// ---------------------------------------------------------------------------

/// A dollar amount in config. Accepts `10000`, or a decimal string such as
/// `"187.33"`. Bare YAML floats are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "MoneyRepr")]
pub struct Money(pub Micros);

#[derive(Deserialize)]
#[serde(untagged)]
enum MoneyRepr {
    Whole(i64),
    Text(String),
    Float(f64),
}

#[derive(Debug)]
pub struct MoneyConfigError(String);

impl fmt::Display for MoneyConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<MoneyRepr> for Money {
    type Error = MoneyConfigError;

    fn try_from(r: MoneyRepr) -> Result<Self, Self::Error> {
        match r {
            MoneyRepr::Whole(d) => Micros::from_dollars(d)
                .map(Money)
                .ok_or_else(|| MoneyConfigError(format!("amount out of range: {d}"))),
            MoneyRepr::Text(s) => Micros::parse_decimal(&s)
                .map(Money)
                .map_err(|e| MoneyConfigError(e.to_string())),
            MoneyRepr::Float(f) => Err(MoneyConfigError(format!(
                "write money as a quoted decimal string, got float {f}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_accepts_integers_and_strings() {
        let m: Money = serde_json::from_value(serde_json::json!(10000)).unwrap();
        assert_eq!(m.0, Micros::new(10_000_000_000));
        let m: Money = serde_json::from_value(serde_json::json!("187.33")).unwrap();
        assert_eq!(m.0, Micros::new(187_330_000));
    }

    #[test]
    fn money_rejects_floats() {
        let r: Result<Money, _> = serde_json::from_value(serde_json::json!(187.33));
        assert!(r.is_err());
    }

    #[test]
    fn defaults_validate() {
        AppConfig::default().validate().unwrap();
    }
}
