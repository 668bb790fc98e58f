use anyhow::{anyhow, Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod store;

pub use store::PgStore;

pub const ENV_DB_URL: &str = "FIN_DATABASE_URL";

/// Connect to Postgres using FIN_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

/// Connect with an already-resolved URL. The URL is never logged.
pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_users_table: bool,
    pub user_count: i64,
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='users'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    let user_count = if exists {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>("select count(*) from users")
            .fetch_one(pool)
            .await
            .context("status user count query failed")?;
        n
    } else {
        0
    };

    Ok(DbStatus {
        ok,
        has_users_table: exists,
        user_count,
    })
}

/// Detect a Postgres unique constraint violation by name.
pub(crate) fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

pub(crate) fn invalid_row(what: &str, detail: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("corrupt {what} row: {detail}")
}
