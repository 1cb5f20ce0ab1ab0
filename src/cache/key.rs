//! Cache key derivation
//!
//! Keys are `:`-joined strings that spell out every input affecting a result,
//! with [`ABSENT`] standing in for unset filters. Two requests with the same
//! effective parameters produce the same key; any single difference produces
//! a different one. None of the encoded values (registry tokens, integers,
//! ISO dates) can contain the delimiter.

use std::fmt;

use crate::query::QueryRequest;

/// Placeholder for an unset optional value
pub const ABSENT: &str = "none";

/// Placeholder for an unlimited row count
pub const UNLIMITED: &str = "all";

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

fn segment<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| v.to_string())
}

impl CacheKey {
    /// Key for an analytics aggregation
    ///
    /// `analytics:{metric}:{dimension}:{channel}:{store}:{weekday}:{from}:{to}:{limit}`
    pub fn for_analytics(request: &QueryRequest) -> Self {
        let filters = request.filters();
        let parts = [
            "analytics".to_string(),
            request.metric().token().to_string(),
            request.dimension().token().to_string(),
            segment(filters.channel_id),
            segment(filters.store_id),
            segment(filters.weekday.map(|w| w.get())),
            segment(filters.date_from.map(|d| d.format("%Y-%m-%d"))),
            segment(filters.date_to.map(|d| d.format("%Y-%m-%d"))),
            request
                .limit()
                .map_or_else(|| UNLIMITED.to_string(), |l| l.to_string()),
        ];
        CacheKey(parts.join(":"))
    }

    /// Key for the channel list
    pub fn channels() -> Self {
        CacheKey("filtros:canais".to_string())
    }

    /// Key for the active store list
    pub fn stores() -> Self {
        CacheKey("filtros:lojas".to_string())
    }

    /// Key for the weekday list
    pub fn weekdays() -> Self {
        CacheKey("filtros:dias_semana".to_string())
    }

    /// Key for the customers-at-risk segment
    pub fn customers_at_risk() -> Self {
        CacheKey("segmentos:clientes_em_risco".to_string())
    }

    /// Key as stored in the backend
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterSet, WeekdayIndex};
    use crate::registry::{Dimension, Metric};
    use chrono::NaiveDate;

    fn request(filters: FilterSet) -> QueryRequest {
        QueryRequest::new(Metric::FaturamentoTotal, Dimension::Loja, filters, Some(50))
    }

    fn full_filters() -> FilterSet {
        FilterSet {
            channel_id: Some(1),
            store_id: Some(2),
            weekday: Some(WeekdayIndex::new(3).unwrap()),
            date_from: NaiveDate::from_ymd_opt(2025, 1, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 1, 31),
        }
    }

    #[test]
    fn test_unfiltered_key_uses_sentinels() {
        let key = CacheKey::for_analytics(&request(FilterSet::default()));
        assert_eq!(
            key.as_str(),
            "analytics:faturamento_total:loja:none:none:none:none:none:50"
        );
    }

    #[test]
    fn test_full_key_layout() {
        let key = CacheKey::for_analytics(&request(full_filters()));
        assert_eq!(
            key.as_str(),
            "analytics:faturamento_total:loja:1:2:3:2025-01-01:2025-01-31:50"
        );
    }

    #[test]
    fn test_identical_parameters_collide() {
        let a = CacheKey::for_analytics(&request(full_filters()));
        let b = CacheKey::for_analytics(&request(full_filters()));
        assert_eq!(a, b);

        // Tokens parsed from the wire and enums built directly agree
        let parsed = QueryRequest::from_tokens("faturamento_total", "loja", full_filters(), Some(50))
            .unwrap();
        assert_eq!(CacheKey::for_analytics(&parsed), a);
    }

    #[test]
    fn test_any_single_change_produces_new_key() {
        let base = CacheKey::for_analytics(&request(full_filters()));
        let variants: Vec<QueryRequest> = vec![
            QueryRequest::new(Metric::TicketMedio, Dimension::Loja, full_filters(), Some(50)),
            QueryRequest::new(Metric::FaturamentoTotal, Dimension::Canal, full_filters(), Some(50)),
            request(FilterSet {
                channel_id: Some(9),
                ..full_filters()
            }),
            request(FilterSet {
                channel_id: None,
                ..full_filters()
            }),
            request(FilterSet {
                store_id: Some(3),
                ..full_filters()
            }),
            request(FilterSet {
                weekday: Some(WeekdayIndex::new(0).unwrap()),
                ..full_filters()
            }),
            request(FilterSet {
                date_from: NaiveDate::from_ymd_opt(2025, 1, 2),
                ..full_filters()
            }),
            request(FilterSet {
                date_to: None,
                ..full_filters()
            }),
            QueryRequest::new(Metric::FaturamentoTotal, Dimension::Loja, full_filters(), None),
        ];

        let mut seen = std::collections::HashSet::new();
        seen.insert(base.clone());
        for variant in &variants {
            let key = CacheKey::for_analytics(variant);
            assert_ne!(key, base, "{:?}", variant);
            assert!(seen.insert(key), "duplicate key for {:?}", variant);
        }
    }

    #[test]
    fn test_channel_and_store_positions_are_distinct() {
        let channel_only = request(FilterSet {
            channel_id: Some(5),
            ..Default::default()
        });
        let store_only = request(FilterSet {
            store_id: Some(5),
            ..Default::default()
        });
        assert_ne!(
            CacheKey::for_analytics(&channel_only),
            CacheKey::for_analytics(&store_only)
        );
    }

    #[test]
    fn test_static_keys() {
        assert_eq!(CacheKey::channels().as_str(), "filtros:canais");
        assert_eq!(CacheKey::stores().as_str(), "filtros:lojas");
        assert_eq!(CacheKey::weekdays().as_str(), "filtros:dias_semana");
        assert_eq!(
            CacheKey::customers_at_risk().to_string(),
            "segmentos:clientes_em_risco"
        );
    }
}
