//! API module
//!
//! JSON-RPC endpoint, session middleware and router assembly.

pub mod middleware;
pub mod routes;
pub mod rpc;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method as HttpMethod};
use axum::{middleware as axum_middleware, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{PasswordHasher, SessionService};
use crate::config::Config;
use crate::error::AppResult;

pub use routes::create_router;

/// Shared state handed to every request
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub hasher: PasswordHasher,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> AppResult<Self> {
        let hasher = PasswordHasher::from_config(&config)?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            hasher,
        })
    }

    pub fn sessions(&self) -> SessionService {
        SessionService::new(
            self.pool.clone(),
            self.hasher.clone(),
            self.config.session_ttl_hours,
        )
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Axum layers are applied in reverse order (last added = first executed)
    // Order: session -> logging -> handler
    let api_routes = create_router()
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([HttpMethod::GET, HttpMethod::POST, HttpMethod::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = %config.cors_origin, "Ignoring invalid CORS origin");
            layer
        }
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
