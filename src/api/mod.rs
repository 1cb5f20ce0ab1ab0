//! HTTP API
//!
//! # Endpoints
//!
//! - `GET /` - Greeting
//! - `GET /health` - Liveness
//! - `GET /api/canais` - Sales channels
//! - `GET /api/lojas` - Active stores
//! - `GET /api/dias-semana` - Weekday list
//! - `GET /api/analytics` - Grouped aggregation (JSON, capped, cached)
//! - `GET /api/exportar-csv` - Grouped aggregation (CSV, uncapped, uncached)
//! - `GET /api/clientes-em-risco` - Repeat customers who went quiet

pub mod error;
pub mod handlers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::cache::CacheAside;
use crate::config::ApplicationConfig;
use crate::store::AnalyticsStore;

pub use error::ApiError;

// =============================================================================
// Application State
// =============================================================================

/// Per-request policy derived from configuration
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Row ceiling for `/api/analytics`
    pub dashboard_row_limit: u32,
    /// TTL for analytics results
    pub analytics_ttl: Duration,
    /// TTL for the channel and store lists
    pub filters_ttl: Duration,
    /// TTL for the weekday list
    pub weekdays_ttl: Duration,
    /// TTL for the customers-at-risk segment
    pub customers_ttl: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self::from(&ApplicationConfig::default())
    }
}

impl From<&ApplicationConfig> for ApiSettings {
    fn from(config: &ApplicationConfig) -> Self {
        Self {
            dashboard_row_limit: config.server.dashboard_row_limit,
            analytics_ttl: config.cache.analytics_ttl(),
            filters_ttl: config.cache.filters_ttl(),
            weekdays_ttl: config.cache.weekdays_ttl(),
            customers_ttl: config.cache.customers_ttl(),
        }
    }
}

/// Shared application state: injected store and cache clients plus policy
pub struct AppState {
    /// Sales database
    pub store: Arc<dyn AnalyticsStore>,
    /// Cache-aside front
    pub cache: CacheAside,
    /// Limits and TTLs
    pub settings: ApiSettings,
}

impl AppState {
    /// Bundle the clients built at startup
    pub fn new(store: Arc<dyn AnalyticsStore>, cache: CacheAside, settings: ApiSettings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Build CORS layer from configuration
pub fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    if cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            },
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

/// Build the application router
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Filter lists
        .route("/api/canais", get(handlers::channels))
        .route("/api/lojas", get(handlers::stores))
        .route("/api/dias-semana", get(handlers::weekdays))
        // Analytics
        .route("/api/analytics", get(handlers::analytics))
        .route("/api/exportar-csv", get(handlers::export_csv))
        // Segments
        .route("/api/clientes-em-risco", get(handlers::customers_at_risk))
        .with_state(state)
        .layer(build_cors_layer(cors_origins))
}
