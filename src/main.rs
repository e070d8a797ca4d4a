//! Resource Lending Server
//!
//! Loans, returns with damage reports, and resource maintenance tracking.

use anyhow::Context;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resource_lending_server::{
    api,
    config::{AppConfig, StorageBackend},
    models::enums::Role,
    repository::{memory::MemoryStore, Repository},
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("resource_lending_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Resource Lending Server v{}", env!("CARGO_PKG_VERSION"));

    let repository = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await
                .context("Failed to connect to database")?;

            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            tracing::info!("Database migrations completed");
            Repository::new(pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on shutdown");
            let store = MemoryStore::new();
            seed_demo(&store);
            Repository::in_memory(store)
        }
    };

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let services = Services::new(repository, &config);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Minimal fixture data so the in-memory backend can be driven through the API
fn seed_demo(store: &MemoryStore) {
    store.add_user("00000001", "Administrador", Role::Administrador);
    store.add_user("12345678", "Docente de prueba", Role::Docente);
    store.add_area("Ciencias");
    store.add_grade("1ro");
    store.add_section("A");
    store.add_resource(1, "Laptop 01");
    store.add_resource(1, "Laptop 02");
    store.add_resource(2, "Proyector 01");
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Loans
        .route("/loans", get(api::loans::list_loans))
        .route("/loans", post(api::loans::create_loan))
        .route("/loans/:id", get(api::loans::get_loan))
        .route("/loans/:id/authorize", post(api::loans::authorize_loan))
        .route("/loans/:id/reject", post(api::loans::reject_loan))
        .route("/loans/:id/return", post(api::loans::return_loan))
        // Maintenance
        .route("/maintenance", get(api::maintenance::list_maintenance))
        .route("/maintenance", post(api::maintenance::create_maintenance))
        .route("/maintenance/:id", get(api::maintenance::get_maintenance))
        .route("/maintenance/:id", delete(api::maintenance::delete_maintenance))
        .route("/maintenance/:id/status", put(api::maintenance::update_maintenance_status))
        .route("/resources/:id/incidents", get(api::maintenance::list_resource_incidents))
        .route("/resources/:id/reports", get(api::maintenance::list_resource_reports))
        // Notifications
        .route("/notifications", get(api::notifications::list_notifications))
        .route("/notifications/stats", get(api::notifications::notification_stats))
        .route("/notifications/read-all", put(api::notifications::mark_all_as_read))
        .route("/notifications/:id/read", put(api::notifications::mark_as_read))
        .route("/notifications/sweep", post(api::notifications::sweep_unresolved))
        .route("/notifications/rules/reload", post(api::notifications::reload_rules))
        // Statistics
        .route("/stats", get(api::stats::get_stats))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}
