//! Relational store access
//!
//! [`AnalyticsStore`] is the seam between the HTTP layer and the sales
//! database. [`PgStore`] is the PostgreSQL implementation; tests substitute
//! in-memory stores.
//!
//! Every method acquires its own pooled connection and returns it on every
//! exit path.

pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use crate::error::StoreError;
use crate::query::BuiltQuery;
pub use postgres::{PgStore, PgStoreConfig};

/// `{id, name}` pair used by the filter lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    /// Primary key
    pub id: i32,
    /// Display name
    pub name: String,
}

/// Value of the grouping column
///
/// Most dimensions group by a name; `hora_do_dia` groups by an integer hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityLabel {
    /// Integer label (hour of day)
    Number(i64),
    /// Text label (store, channel, product, weekday name)
    Text(String),
    /// NULL in the grouping column
    Missing,
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityLabel::Number(n) => write!(f, "{}", n),
            EntityLabel::Text(s) => f.write_str(s),
            EntityLabel::Missing => Ok(()),
        }
    }
}

/// One grouped row of an analytics query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRow {
    /// Grouping value
    pub nome_entidade: EntityLabel,
    /// Aggregate value, `None` if the aggregate was NULL
    pub valor_metrica: Option<f64>,
}

/// Repeat customer who has gone quiet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAtRisk {
    /// Customer name
    pub customer_name: Option<String>,
    /// Phone number
    pub phone_number: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Completed purchases
    pub total_compras: i64,
    /// Most recent completed purchase
    pub ultima_compra: NaiveDateTime,
    /// Lifetime value over completed purchases
    pub ltv_total: Option<f64>,
    /// Days since the most recent purchase
    pub dias_desde_ultima_compra: i32,
}

/// Read-only access to the sales dataset
#[async_trait]
pub trait AnalyticsStore: Send + Sync + 'static {
    /// Run a grouped aggregation built by [`crate::query::build`]
    async fn aggregate(&self, query: &BuiltQuery) -> Result<Vec<AnalyticsRow>, StoreError>;

    /// All channels ordered by name
    async fn channels(&self) -> Result<Vec<NamedEntity>, StoreError>;

    /// Active stores ordered by name
    async fn active_stores(&self) -> Result<Vec<NamedEntity>, StoreError>;

    /// Name of a store, `None` if the id is unknown
    async fn store_name(&self, id: i32) -> Result<Option<String>, StoreError>;

    /// Name of a channel, `None` if the id is unknown
    async fn channel_name(&self, id: i32) -> Result<Option<String>, StoreError>;

    /// Customers with at least 3 completed purchases and none in the last 30 days
    async fn customers_at_risk(&self) -> Result<Vec<CustomerAtRisk>, StoreError>;

    /// Release pooled connections at shutdown
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_serialization() {
        let rows = vec![
            AnalyticsRow {
                nome_entidade: EntityLabel::Text("Loja Centro".to_string()),
                valor_metrica: Some(1520.5),
            },
            AnalyticsRow {
                nome_entidade: EntityLabel::Number(19),
                valor_metrica: None,
            },
        ];
        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            json!([
                {"nome_entidade": "Loja Centro", "valor_metrica": 1520.5},
                {"nome_entidade": 19, "valor_metrica": null},
            ])
        );
    }

    #[test]
    fn test_label_deserializes_from_cache_payload() {
        let rows: Vec<AnalyticsRow> = serde_json::from_value(json!([
            {"nome_entidade": 7, "valor_metrica": 3.0},
            {"nome_entidade": "Sábado", "valor_metrica": 2.0},
            {"nome_entidade": null, "valor_metrica": 1.0},
        ]))
        .unwrap();
        assert_eq!(rows[0].nome_entidade, EntityLabel::Number(7));
        assert_eq!(rows[1].nome_entidade.to_string(), "Sábado");
        assert_eq!(rows[2].nome_entidade, EntityLabel::Missing);
    }
}
