//! Request and response types for the HTTP API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStatsSnapshot;
use crate::query::{FilterSet, QueryError, QueryRequest, WeekdayIndex};

// =============================================================================
// Query Types
// =============================================================================

fn default_metric() -> String {
    "faturamento_total".to_string()
}

fn default_dimension() -> String {
    "loja".to_string()
}

/// Query string of `/api/analytics` and `/api/exportar-csv`
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsParams {
    /// Metric token
    #[serde(default = "default_metric")]
    pub metric: String,
    /// Dimension token
    #[serde(default = "default_dimension")]
    pub dimension: String,
    /// Channel filter
    pub channel_id: Option<i32>,
    /// Store filter
    pub store_id: Option<i32>,
    /// Weekday filter, 0 = Sunday
    pub dia_semana: Option<i32>,
    /// First day included
    pub date_from: Option<NaiveDate>,
    /// Last day included
    pub date_to: Option<NaiveDate>,
}

impl Default for AnalyticsParams {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            dimension: default_dimension(),
            channel_id: None,
            store_id: None,
            dia_semana: None,
            date_from: None,
            date_to: None,
        }
    }
}

impl AnalyticsParams {
    /// Validate against the registry and build the request
    pub fn into_request(self, limit: Option<u32>) -> Result<QueryRequest, QueryError> {
        let weekday = self.dia_semana.map(WeekdayIndex::new).transpose()?;
        let filters = FilterSet {
            channel_id: self.channel_id,
            store_id: self.store_id,
            weekday,
            date_from: self.date_from,
            date_to: self.date_to,
        };
        QueryRequest::from_tokens(&self.metric, &self.dimension, filters, limit)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Plain message body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Message text
    pub message: &'static str,
}

/// Liveness body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Active cache backend
    pub cache_backend: &'static str,
    /// Cache counters since startup
    pub cache: CacheStatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Dimension, Metric};

    #[test]
    fn test_defaults() {
        let params: AnalyticsParams = serde_json::from_str("{}").unwrap();
        let request = params.into_request(Some(50)).unwrap();
        assert_eq!(request.metric(), Metric::FaturamentoTotal);
        assert_eq!(request.dimension(), Dimension::Loja);
        assert_eq!(request.filters(), &FilterSet::default());
        assert_eq!(request.limit(), Some(50));
    }

    #[test]
    fn test_weekday_range() {
        let params = AnalyticsParams {
            dia_semana: Some(6),
            ..Default::default()
        };
        assert_eq!(
            params.into_request(None).unwrap().filters().weekday.map(|w| w.get()),
            Some(6)
        );

        let params = AnalyticsParams {
            dia_semana: Some(7),
            ..Default::default()
        };
        assert_eq!(
            params.into_request(None).unwrap_err(),
            QueryError::InvalidWeekday(7)
        );
    }

    #[test]
    fn test_unknown_tokens() {
        let params = AnalyticsParams {
            dimension: "cliente".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            params.into_request(None),
            Err(QueryError::InvalidDimension(_))
        ));
    }
}
