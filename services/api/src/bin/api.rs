//! services/api/src/bin/api.rs

use api_lib::{
    adapters::db::DbStore,
    config::Config,
    error::ApiError,
    web::{
        create_website_handler, list_websites_handler, snippet_handler, state::AppState,
        stats, track_handler, ApiDoc,
    },
};
use axum::http::{header::CONTENT_TYPE, Method};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(DbStore::new(db_pool));
    info!("Running database migrations...");
    store
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        config: config.clone(),
    });

    // The tracking script runs on arbitrary third-party origins, so the
    // ingestion route must answer cross-origin requests and their preflight.
    let track_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 4. Create the Web Router ---
    let tracking_routes = Router::new()
        .route("/api/track", post(track_handler))
        .layer(track_cors);

    let dashboard_routes = Router::new()
        .route(
            "/api/websites",
            get(list_websites_handler).post(create_website_handler),
        )
        .route("/api/websites/{id}/events", get(stats::events_handler))
        .route("/api/websites/{id}/sources", get(stats::sources_handler))
        .route("/api/websites/{id}/pages", get(stats::pages_handler))
        .route("/api/websites/{id}/trend", get(stats::trend_handler))
        .route("/api/websites/{id}/summary", get(stats::summary_handler));

    let api_router = Router::new()
        .merge(tracking_routes)
        .merge(dashboard_routes)
        .route("/tracker.js", get(snippet_handler))
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Embed the snippet from {}/tracker.js with your data-website-id",
        config.public_url
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
