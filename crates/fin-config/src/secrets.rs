//! Runtime secret resolution.
//!
//! Config YAML stores env var NAMES only. Binaries call [`resolve_secrets`]
//! once at startup and pass the result into constructors; nothing else reads
//! secret env vars. `Debug` redacts values and error messages name the
//! variable, never its contents.
//!
//! | Purpose | Required                                                     |
//! |---------|--------------------------------------------------------------|
//! | Daemon  | JWT secret; quote token if `quotes.provider=iex`; DB URL if `database.backend=postgres` |
//! | Cli     | DB URL                                                       |

use anyhow::{bail, Result};

use crate::{AppConfig, DatabaseBackend, QuoteProviderKind};

/// HS256 secrets shorter than this are refused.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretPurpose {
    Daemon,
    Cli,
}

impl SecretPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretPurpose::Daemon => "DAEMON",
            SecretPurpose::Cli => "CLI",
        }
    }
}

#[derive(Clone)]
pub struct ResolvedSecrets {
    pub jwt_secret: Option<String>,
    pub quote_api_key: Option<String>,
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<REDACTED>"))
            .field(
                "quote_api_key",
                &self.quote_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn missing(purpose: SecretPurpose, var: &str, what: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "SECRETS_MISSING purpose={}: required env var '{}' ({}) is not set or empty",
        purpose.as_str(),
        var,
        what
    )
}

pub fn resolve_secrets(cfg: &AppConfig, purpose: SecretPurpose) -> Result<ResolvedSecrets> {
    let jwt_secret = resolve_env(&cfg.auth.jwt_secret_env);
    let quote_api_key = resolve_env(&cfg.quotes.api_key_env);
    let database_url = resolve_env(&cfg.database.url_env);

    match purpose {
        SecretPurpose::Daemon => {
            let Some(secret) = jwt_secret.as_deref() else {
                return Err(missing(purpose, &cfg.auth.jwt_secret_env, "jwt signing secret"));
            };
            if secret.len() < MIN_JWT_SECRET_LEN {
                bail!(
                    "SECRETS_WEAK purpose=DAEMON: env var '{}' must hold at least {} bytes",
                    cfg.auth.jwt_secret_env,
                    MIN_JWT_SECRET_LEN
                );
            }
            if cfg.quotes.provider == QuoteProviderKind::Iex && quote_api_key.is_none() {
                return Err(missing(purpose, &cfg.quotes.api_key_env, "quote api token"));
            }
            if cfg.database.backend == DatabaseBackend::Postgres && database_url.is_none() {
                return Err(missing(purpose, &cfg.database.url_env, "database url"));
            }
        }
        SecretPurpose::Cli => {
            if database_url.is_none() {
                return Err(missing(purpose, &cfg.database.url_env, "database url"));
            }
        }
    }

    Ok(ResolvedSecrets {
        jwt_secret,
        quote_api_key,
        database_url,
    })
}
