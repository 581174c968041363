//! meterops-api library - meter reading administration service
//!
//! Capture devices sync readings here; supervisors review them, watch the
//! analytics counters and browse exceptions.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use meterops_common::api::TokenVerifier;
use meterops_common::config::{ServiceConfig, DEFAULT_MAX_BODY_BYTES};
use sqlx::SqlitePool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod db;
pub mod payload;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Bearer token verifier for protected routes
    pub verifier: Arc<dyn TokenVerifier>,
    /// Request body limit in bytes
    pub max_body_bytes: usize,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Arc<[String]>,
}

impl AppState {
    /// Create new application state with default limits and permissive CORS
    pub fn new(db: SqlitePool, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            db,
            verifier,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            cors_origins: Arc::from(Vec::new()),
        }
    }

    /// Create application state with limits taken from configuration
    pub fn from_config(
        db: SqlitePool,
        verifier: Arc<dyn TokenVerifier>,
        config: &ServiceConfig,
    ) -> Self {
        let cors_origins = if config.cors_permissive() {
            Vec::new()
        } else {
            config.cors_origins.clone()
        };

        Self {
            db,
            verifier,
            max_body_bytes: config.max_body_bytes,
            cors_origins: Arc::from(cors_origins),
        }
    }
}

/// Build application router
///
/// `/health` is public; every other route requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/analytics", get(api::get_analytics))
        .route("/readings", get(api::list_readings))
        .route("/readings/sync", post(api::sync_readings))
        .route("/readings/:reading_id/status", post(api::update_reading_status))
        .route("/exceptions", get(api::list_exceptions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new().merge(api::health_routes());

    let cors = cors_layer(&state.cors_origins);
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy: any origin when no list is configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
