//! Demo server: mounts common and entity routes over either PostgreSQL
//! (when DATABASE_URL is set) or the in-memory store.

use axum::Router;
use lims_sdk::{
    common_routes_with_ready, ensure_database_exists, entity_routes, AppState, MemoryStore,
    PgStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("lims_sdk=info".parse()?))
        .init();

    let state = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            ensure_database_exists(&database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            let store = PgStore::new(pool);
            store.ensure_tables().await?;
            tracing::info!("using PostgreSQL store");
            AppState::new(Arc::new(store))
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set; using in-memory store");
            AppState::new(Arc::new(MemoryStore::new()))
        }
    };

    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api", entity_routes(state))
        .layer(RequestBodyLimitLayer::new(1024 * 1024));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
