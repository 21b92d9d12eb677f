use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cinematch_api::{
    config::Config,
    db::create_pool,
    routes::{create_router, AppState},
    services::{catalog::TmdbCatalog, oracle::HttpScoringOracle},
    store::PgEvidenceStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to connect to database")?;

    let state = AppState::new(
        Arc::new(PgEvidenceStore::new(pool)),
        Arc::new(TmdbCatalog::new(
            config.tmdb_api_key.clone(),
            config.tmdb_api_url.clone(),
        )),
        Arc::new(HttpScoringOracle::new(
            config.oracle_url.clone(),
            config.oracle_api_key.clone(),
        )),
    );

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(address = %addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
