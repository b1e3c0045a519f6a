use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates a PostgreSQL connection pool and makes sure the record table exists.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    ensure_schema(&pool).await?;
    info!("PostgreSQL connection pool established");
    Ok(pool)
}

async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_records (
            id UUID PRIMARY KEY,
            kind TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            record JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS analysis_records_lookup \
         ON analysis_records (kind, subject_name, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
