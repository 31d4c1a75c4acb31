//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, MemoryStore},
    config::Config,
    error::ApiError,
    token::TokenService,
    web::{self, AppState},
};
use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use bookstore_core::ports::DatabaseService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Select the Store ---
    let db: Arc<dyn DatabaseService> = if config.uses_memory_store() {
        warn!("Using the in-memory store. Data is lost on shutdown.");
        Arc::new(MemoryStore::new())
    } else {
        info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;
        let db_adapter = DbAdapter::new(db_pool);
        info!("Running database migrations...");
        db_adapter.run_migrations().await?;
        info!("Database migrations complete.");
        Arc::new(db_adapter)
    };

    // --- 3. Build the Shared AppState ---
    let tokens = TokenService::from_config(&config)?;
    let app_state = Arc::new(AppState::new(db, tokens));

    // --- 4. Create the Web Router ---
    let mut app = web::router(app_state);
    if let Some(origin) = &config.cors_allowed_origin {
        let origin = origin.parse::<HeaderValue>().map_err(|e| {
            ApiError::Internal(format!("Invalid CORS_ALLOWED_ORIGIN '{}': {}", origin, e))
        })?;
        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
        app = app.layer(cors);
    }

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
