use sqlx::{postgres::PgPoolOptions, PgPool};

/// Builds the shared Postgres pool the evidence store runs on
///
/// Sized from configuration; every store query borrows a connection from
/// this pool, so the cap also bounds concurrent recommendation cycles
/// touching the database.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}
