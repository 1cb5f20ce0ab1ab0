//! Nola Analytics - read-only sales analytics API
//!
//! This library turns whitelisted metric / dimension tokens into
//! parameterized aggregation SQL, serves the results through a Redis
//! cache-aside layer, and renders them as JSON or as a CSV report:
//! - Closed metric and dimension registry, unknown tokens rejected up front
//! - Filters bound as statement parameters, never interpolated
//! - Cache failures degrade to direct database reads
//! - CSV export with a filter summary header

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod registry;

/// Analytics request model and SQL builder
pub mod query;

/// Cache-aside layer with in-memory and disabled backends
pub mod cache;

/// Redis cache backend
pub mod redis;

/// Relational store access (PostgreSQL)
pub mod store;

/// CSV report rendering
pub mod export;

/// Configuration management with TOML support
pub mod config;

/// HTTP router, handlers and error mapping
pub mod api;

// Re-export main types
pub use api::{build_router, ApiError, AppState};
pub use config::ApplicationConfig;
pub use query::{FilterSet, QueryRequest};
pub use registry::{Dimension, Metric};
