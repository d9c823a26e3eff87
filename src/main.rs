mod board;
mod config;
mod db;
mod error;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use config::{AppConfig, StorageBackend};
use services::catalog::JikanClient;
use services::persistence::{KvStore, MemoryKvStore, PgKvStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let pool = match config.database_url.as_deref() {
        Some(url) => Some(
            db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed"),
        ),
        None => None,
    };

    // `from_env` guarantees a pool for the postgres backend.
    let store: Arc<dyn KvStore> = match (config.storage, &pool) {
        (StorageBackend::Postgres, Some(pool)) => Arc::new(PgKvStore::new(pool.clone())),
        _ => Arc::new(MemoryKvStore::new()),
    };
    if pool.is_none() {
        tracing::warn!("DATABASE_URL not set; templates disabled");
    }

    let catalog = Arc::new(JikanClient::new(&config.catalog).expect("catalog client init failed"));

    let port = config.port;
    let storage = config.storage;
    let state = state::AppState::new(pool, store, catalog, config);
    services::board::spawn_eviction_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, ?storage, "tierboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
