//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenRouterCompletions},
    config::Config,
    error::ApiError,
    web::{
        chat_turn_handler, daily_summary_handler, health_handler, log_meal_handler,
        middleware::require_auth, resolve_clarification_handler, rest::ApiDoc, state::AppState,
    },
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
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
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    // The completion adapter holds no key; credentials are resolved per
    // request so an admin-stored key takes effect without a restart.
    let completions = Arc::new(OpenRouterCompletions::new(
        config.openrouter_base_url.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        completions,
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new().route("/api/health", get(health_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/log", post(log_meal_handler))
        .route("/api/clarify", post(resolve_clarification_handler))
        .route("/api/chat", post(chat_turn_handler))
        .route("/api/summary/{pet_id}", get(daily_summary_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
