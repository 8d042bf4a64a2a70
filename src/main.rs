mod aggregation;
mod bank_client;
mod config;
mod customer_registry;
mod decryption;
mod endpoints;
mod errors;
mod handlers;
mod mapper;
mod models;
mod token_provider;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::aggregation::Aggregator;
use crate::config::Config;
use crate::customer_registry::CustomerRegistry;
use crate::endpoints::EndpointCatalogue;
use crate::token_provider::TokenProvider;

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the shared HTTP client, the endpoint
/// catalogue cache and the aggregation pipeline, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bank_aggregator_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // One HTTP client for the whole process; every call sets its own deadline.
    let http = reqwest::Client::builder().build()?;

    let token_provider = TokenProvider::new(
        http.clone(),
        config.token_endpoint.clone(),
        config.client_id.clone(),
    );

    let registry = CustomerRegistry::new(
        http.clone(),
        token_provider.clone(),
        config.kar_url.clone(),
        config.units_registry_url.clone(),
        config.implemented_banks.clone(),
        config.maskinporten_env.clone(),
    );

    let catalogue = EndpointCatalogue::new(
        http.clone(),
        config.endpoints_url.clone(),
        config.use_test_endpoints,
        config.endpoint_cache_ttl_minutes,
    );
    tracing::info!(
        "Endpoint catalogue cache initialized ({} min TTL)",
        config.endpoint_cache_ttl_minutes
    );

    let aggregator = Aggregator::new(
        http.clone(),
        token_provider.clone(),
        Arc::new(config.decryption_key_pem.clone()),
        config.bank_scope.clone(),
    );

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        aggregator,
        registry,
        catalogue,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("valid rate limiter configuration"),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/accounts", post(handlers::aggregate_accounts))
        .route("/api/v1/endpoints", get(handlers::list_endpoints))
        .route(
            "/api/v1/endpoints/refresh",
            post(handlers::refresh_endpoints),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check outside the rate-limited group
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
