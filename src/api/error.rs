//! HTTP-facing errors
//!
//! Every failure a client can see is an [`ApiError`], rendered as
//! `{ "detail": "<message>" }` with the matching status code. Cache failures
//! never show up here.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::query::QueryError;
use crate::store::StoreError;

const STORE_UNAVAILABLE_DETAIL: &str = "Não foi possível conectar ao banco de dados";

/// Client-visible request failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Unknown metric or dimension, an out-of-range weekday, or a query
    /// string value of the wrong type
    #[error("{0}")]
    InvalidParameter(String),

    /// No database connection could be obtained
    #[error("{}", STORE_UNAVAILABLE_DETAIL)]
    StoreUnavailable,

    /// The statement failed
    #[error("{0}")]
    StoreQueryFailure(String),

    /// Export matched no rows
    #[error("Nenhum dado encontrado para exportar com estes filtros.")]
    EmptyExportResult,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreUnavailable | ApiError::StoreQueryFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            ApiError::EmptyExportResult => StatusCode::NOT_FOUND,
        }
    }
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::InvalidParameter(err.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidParameter(format!("Parâmetros inválidos: {}", rejection.body_text()))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // Connection details were logged by the store
            StoreError::Unavailable(_) => ApiError::StoreUnavailable,
            StoreError::Query(message) => ApiError::StoreQueryFailure(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Query;
    use axum::http::Uri;

    use super::*;
    use crate::api::types::AnalyticsParams;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(QueryError::InvalidMetric("lucro".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(QueryError::InvalidWeekday(9)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::unavailable("refused")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(StoreError::query("syntax error")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::EmptyExportResult.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ApiError::from(QueryError::InvalidMetric("lucro".to_string())).to_string(),
            "Métrica inválida: lucro"
        );
        assert_eq!(
            ApiError::from(StoreError::unavailable("password authentication failed")).to_string(),
            "Não foi possível conectar ao banco de dados"
        );
        assert_eq!(
            ApiError::from(StoreError::query("relation \"sales\" does not exist")).to_string(),
            "relation \"sales\" does not exist"
        );
    }

    #[test]
    fn test_malformed_query_string_is_invalid_parameter() {
        let uri: Uri = "/api/analytics?store_id=abc".parse().unwrap();
        let rejection = Query::<AnalyticsParams>::try_from_uri(&uri).unwrap_err();

        let err = ApiError::from(rejection);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("Parâmetros inválidos: "));
        assert!(err.to_string().contains("store_id"));
    }
}
