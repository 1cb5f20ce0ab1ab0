//! Analytics query model and SQL builder
//!
//! A [`QueryRequest`] is the validated, immutable form of an analytics call.
//! It fully determines both the SQL that is emitted ([`builder::build`]) and
//! the cache key it is stored under ([`crate::cache::CacheKey::for_analytics`]).
//!
//! # Example
//!
//! ```rust
//! use nola_analytics::query::{FilterSet, QueryRequest};
//!
//! let request = QueryRequest::from_tokens("total_de_vendas", "loja", FilterSet::default(), Some(50))
//!     .expect("registered tokens");
//! let built = request.build();
//! assert!(built.sql.ends_with("LIMIT 50"));
//! assert!(built.params.is_empty());
//! ```

pub mod builder;
pub mod error;

use chrono::NaiveDate;

use crate::registry::{Dimension, Metric};

pub use builder::{build, BuiltQuery, SqlParam};
pub use error::QueryError;

/// Validated weekday index, 0 (Sunday) through 6 (Saturday)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekdayIndex(u8);

impl WeekdayIndex {
    /// Validate a raw index
    pub fn new(index: i32) -> Result<Self, QueryError> {
        u8::try_from(index)
            .ok()
            .filter(|i| *i <= 6)
            .map(WeekdayIndex)
            .ok_or(QueryError::InvalidWeekday(index))
    }

    /// Raw index value
    pub fn get(self) -> u8 {
        self.0
    }

    /// Display name
    pub fn name(self) -> &'static str {
        // Index is range-checked at construction
        crate::registry::WEEKDAY_NAMES[self.0 as usize]
    }
}

/// Optional filters, AND-combined when present
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterSet {
    /// Sales channel id
    pub channel_id: Option<i32>,
    /// Store id
    pub store_id: Option<i32>,
    /// Weekday of the sale
    pub weekday: Option<WeekdayIndex>,
    /// First day included (inclusive)
    pub date_from: Option<NaiveDate>,
    /// Last day included (inclusive)
    pub date_to: Option<NaiveDate>,
}

/// Validated analytics request
///
/// `limit` is set for interactive (dashboard) calls and left `None` for
/// exports, which must return every row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryRequest {
    metric: Metric,
    dimension: Dimension,
    filters: FilterSet,
    limit: Option<u32>,
}

impl QueryRequest {
    /// Create a request from already-resolved registry entries
    pub fn new(
        metric: Metric,
        dimension: Dimension,
        filters: FilterSet,
        limit: Option<u32>,
    ) -> Self {
        Self {
            metric,
            dimension,
            filters,
            limit,
        }
    }

    /// Resolve wire tokens through the registry
    ///
    /// Fails with [`QueryError::InvalidMetric`] or [`QueryError::InvalidDimension`]
    /// for tokens outside the whitelist.
    pub fn from_tokens(
        metric: &str,
        dimension: &str,
        filters: FilterSet,
        limit: Option<u32>,
    ) -> Result<Self, QueryError> {
        let metric = Metric::from_token(metric)?;
        let dimension = Dimension::from_token(dimension)?;
        Ok(Self::new(metric, dimension, filters, limit))
    }

    /// Requested metric
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Requested dimension
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Applied filters
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Row ceiling, `None` for exports
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Assemble the parameterized SQL for this request
    pub fn build(&self) -> BuiltQuery {
        build(self.metric, self.dimension, &self.filters, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_index_bounds() {
        assert_eq!(WeekdayIndex::new(0).map(WeekdayIndex::get), Ok(0));
        assert_eq!(WeekdayIndex::new(6).map(WeekdayIndex::name), Ok("Sábado"));
        assert_eq!(WeekdayIndex::new(7), Err(QueryError::InvalidWeekday(7)));
        assert_eq!(WeekdayIndex::new(-1), Err(QueryError::InvalidWeekday(-1)));
        assert_eq!(
            WeekdayIndex::new(i32::MAX),
            Err(QueryError::InvalidWeekday(i32::MAX))
        );
    }

    #[test]
    fn test_from_tokens_validates_metric_first() {
        let err = QueryRequest::from_tokens("nope", "also_nope", FilterSet::default(), None)
            .unwrap_err();
        assert_eq!(err, QueryError::InvalidMetric("nope".to_string()));

        let err = QueryRequest::from_tokens("ticket_medio", "cidade", FilterSet::default(), None)
            .unwrap_err();
        assert_eq!(err, QueryError::InvalidDimension("cidade".to_string()));
    }
}
