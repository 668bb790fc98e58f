//! `fin`: operator CLI for the trading store.
//!
//! Database maintenance, config inspection, and ledger audits. Everything
//! that touches the database reads its URL from `FIN_DATABASE_URL`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fin_config::{report_unused_keys, UnusedKeyPolicy};
use fin_engine::{Engine, EngineConfig};
use fin_portfolio::format_usd;
use fin_quote::StaticQuoteProvider;

#[derive(Parser)]
#[command(name = "fin")]
#[command(about = "Finance trading store CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overlay ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Validate a layered config and list keys nothing reads
    ConfigCheck {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail instead of warn when unused keys are present
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Ledger audits
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations (idempotent).
    Migrate,
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Replay one user's transaction log and compare with stored cash and holdings.
    Verify {
        #[arg(long)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = fin_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = fin_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_users_table={} user_count={}",
                        s.ok, s.has_users_table, s.user_count
                    );
                }
                DbCmd::Migrate => {
                    fin_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = fin_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::ConfigCheck { paths, strict } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = fin_config::load_layered_yaml(&path_refs)?;
            let cfg = loaded.app_config()?;

            let policy = if strict {
                UnusedKeyPolicy::Fail
            } else {
                UnusedKeyPolicy::Warn
            };
            let report = report_unused_keys(&loaded.config_json, policy)?;
            for ptr in &report.unused_leaf_pointers {
                println!("unused_key={}", ptr);
            }

            println!("config_ok=true config_hash={}", loaded.config_hash);
            println!(
                "quote_provider={:?} database_backend={:?} initial_cash={}",
                cfg.quotes.provider,
                cfg.database.backend,
                format_usd(cfg.accounts.initial_cash.0)
            );
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { username } => {
                let pool = fin_db::connect_from_env().await?;
                let store = Arc::new(fin_db::PgStore::new(pool));
                // Replay never prices anything, so an empty quote table is enough.
                let engine = Engine::new(
                    store,
                    Arc::new(StaticQuoteProvider::new()),
                    EngineConfig::default(),
                );

                let user = engine
                    .find_user(&username)
                    .await?
                    .with_context(|| format!("no such user '{}'", username.trim()))?;
                let report = engine.audit(user).await?;

                println!("user_id={} entries={}", user, report.replayed.entries);
                println!("replayed_cash={}", format_usd(report.replayed.cash));
                for (sym, n) in &report.replayed.holdings {
                    println!("replayed_shares {}={}", sym, n);
                }
                for d in &report.drifts {
                    println!("drift {}", d);
                }
                if !report.is_consistent() {
                    bail!(
                        "LEDGER_DRIFT: {} mismatch(es) for user '{}'",
                        report.drifts.len(),
                        username.trim()
                    );
                }
                println!("ledger_consistent=true");
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
