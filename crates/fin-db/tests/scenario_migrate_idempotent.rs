//! Migrating twice on the same database is a no-op the second time.
//!
//! DB-backed test, skipped if FIN_DATABASE_URL is not set.

#[tokio::test]
async fn migrate_idempotent_on_clean_db() -> anyhow::Result<()> {
    let url = match std::env::var(fin_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: FIN_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;

    fin_db::migrate(&pool).await?;
    fin_db::migrate(&pool).await?;

    let st = fin_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_users_table);

    Ok(())
}
