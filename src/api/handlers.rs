//! HTTP handlers
//!
//! Interactive endpoints go through the cache-aside layer; the CSV export
//! always reads the database. Request validation runs before any store or
//! cache access, so a rejected request costs nothing downstream.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{debug, info};

use super::error::ApiError;
use super::types::{AnalyticsParams, HealthResponse, MessageResponse};
use super::AppState;
use crate::cache::CacheKey;
use crate::export::{self, AppliedFilters, CsvReport};
use crate::registry::WEEKDAY_NAMES;
use crate::store::{AnalyticsRow, CustomerAtRisk, NamedEntity};

// =============================================================================
// Health
// =============================================================================

/// Root greeting
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "API de Analytics da Nola está no ar!",
    })
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        cache_backend: state.cache.backend_name(),
        cache: state.cache.stats(),
    })
}

// =============================================================================
// Filter Lists
// =============================================================================

/// All sales channels
pub async fn channels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NamedEntity>>, ApiError> {
    let store = Arc::clone(&state.store);
    let channels = state
        .cache
        .get_or_compute(&CacheKey::channels(), state.settings.filters_ttl, || async move {
            store.channels().await
        })
        .await?;
    Ok(Json(channels))
}

/// Active stores
pub async fn stores(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NamedEntity>>, ApiError> {
    let store = Arc::clone(&state.store);
    let stores = state
        .cache
        .get_or_compute(&CacheKey::stores(), state.settings.filters_ttl, || async move {
            store.active_stores().await
        })
        .await?;
    Ok(Json(stores))
}

/// Weekday list, 0 = Domingo through 6 = Sábado
pub async fn weekdays(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NamedEntity>>, ApiError> {
    let days = state
        .cache
        .get_or_compute(&CacheKey::weekdays(), state.settings.weekdays_ttl, || async {
            Ok::<_, ApiError>(
                WEEKDAY_NAMES
                    .iter()
                    .zip(0..)
                    .map(|(name, id)| NamedEntity {
                        id,
                        name: (*name).to_string(),
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .await?;
    Ok(Json(days))
}

// =============================================================================
// Analytics
// =============================================================================

/// Grouped aggregation for the dashboard, capped at the row limit
pub async fn analytics(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AnalyticsParams>, QueryRejection>,
) -> Result<Json<Vec<AnalyticsRow>>, ApiError> {
    let Query(params) = params?;
    let request = params.into_request(Some(state.settings.dashboard_row_limit))?;
    let key = CacheKey::for_analytics(&request);

    let store = Arc::clone(&state.store);
    let rows = state
        .cache
        .get_or_compute(&key, state.settings.analytics_ttl, || async move {
            store.aggregate(&request.build()).await
        })
        .await?;

    debug!(key = %key, rows = rows.len(), "Analytics served");
    Ok(Json(rows))
}

/// Full, uncached aggregation as a CSV download
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AnalyticsParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let request = params.into_request(None)?;

    let rows = state.store.aggregate(&request.build()).await?;
    if rows.is_empty() {
        return Err(ApiError::EmptyExportResult);
    }

    let filters = request.filters();
    let store_name = match filters.store_id {
        Some(id) => Some(
            state
                .store
                .store_name(id)
                .await?
                .unwrap_or_else(|| id.to_string()),
        ),
        None => None,
    };
    let channel_name = match filters.channel_id {
        Some(id) => Some(
            state
                .store
                .channel_name(id)
                .await?
                .unwrap_or_else(|| id.to_string()),
        ),
        None => None,
    };

    let report = CsvReport {
        generated_on: chrono::Local::now().date_naive(),
        metric: request.metric(),
        dimension: request.dimension(),
        filters: AppliedFilters {
            store_name,
            channel_name,
            weekday: filters.weekday,
            date_from: filters.date_from,
            date_to: filters.date_to,
        },
    };

    info!(
        metric = request.metric().token(),
        dimension = request.dimension().token(),
        rows = rows.len(),
        "CSV export generated"
    );

    Ok((
        [
            (header::CONTENT_TYPE, export::CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, report.content_disposition()),
        ],
        report.render(&rows),
    ))
}

// =============================================================================
// Segments
// =============================================================================

/// Repeat customers who have not bought in over 30 days
pub async fn customers_at_risk(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CustomerAtRisk>>, ApiError> {
    let store = Arc::clone(&state.store);
    let customers = state
        .cache
        .get_or_compute(
            &CacheKey::customers_at_risk(),
            state.settings.customers_ttl,
            || async move { store.customers_at_risk().await },
        )
        .await?;
    Ok(Json(customers))
}
