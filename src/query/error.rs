//! Query validation errors
//!
//! Raised while turning raw request tokens into a [`QueryRequest`](super::QueryRequest).
//! Every variant is produced before any SQL text exists, so an invalid request
//! never reaches the store.

use thiserror::Error;

/// Validation failure for an analytics request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Metric token is not in the registry
    #[error("Métrica inválida: {0}")]
    InvalidMetric(String),

    /// Dimension token is not in the registry
    #[error("Dimensão inválida: {0}")]
    InvalidDimension(String),

    /// Weekday index outside 0 (Sunday) ..= 6 (Saturday)
    #[error("Dia da semana inválido: {0} (esperado 0-6)")]
    InvalidWeekday(i32),
}
