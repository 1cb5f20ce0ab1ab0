//! PostgreSQL store on a `sqlx` pool
//!
//! The pool is created lazily: the server starts without a reachable
//! database, and a request that cannot get a connection fails with
//! [`StoreError::Unavailable`].

use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, error};

use super::{AnalyticsRow, AnalyticsStore, CustomerAtRisk, EntityLabel, NamedEntity, StoreError};
use crate::query::builder::VALUE_ALIAS;
use crate::query::{BuiltQuery, SqlParam};
use crate::registry::ENTITY_ALIAS;

const CHANNELS_SQL: &str = "SELECT id, name FROM channels ORDER BY name";

const ACTIVE_STORES_SQL: &str = "SELECT id, name FROM stores WHERE is_active = true ORDER BY name";

const STORE_NAME_SQL: &str = "SELECT name FROM stores WHERE id = $1";

const CHANNEL_NAME_SQL: &str = "SELECT name FROM channels WHERE id = $1";

const CUSTOMERS_AT_RISK_SQL: &str = r#"
    WITH kpis AS (
        SELECT
            customer_id,
            COUNT(id) AS total_compras,
            MAX(created_at) AS ultima_compra,
            SUM(total_amount) AS ltv_total
        FROM sales
        WHERE customer_id IS NOT NULL AND sale_status_desc = 'COMPLETED'
        GROUP BY customer_id
    )
    SELECT
        c.customer_name,
        c.phone_number,
        c.email,
        k.total_compras,
        CAST(k.ultima_compra AS TIMESTAMP) AS ultima_compra,
        CAST(k.ltv_total AS DOUBLE PRECISION) AS ltv_total,
        (CURRENT_DATE - k.ultima_compra::date) AS dias_desde_ultima_compra
    FROM kpis k
    JOIN customers c ON k.customer_id = c.id
    WHERE k.total_compras >= 3 AND (CURRENT_DATE - k.ultima_compra::date) > 30
    ORDER BY dias_desde_ultima_compra DESC, k.total_compras DESC
"#;

/// Connection settings for [`PgStore`]
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login role
    pub user: String,
    /// Login password
    pub password: String,
    /// Pool size
    pub max_connections: u32,
    /// How long a request waits for a pooled connection
    pub acquire_timeout: Duration,
}

/// PostgreSQL-backed [`AnalyticsStore`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Build a lazily-connecting pool
    pub fn connect_lazy(config: &PgStoreConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .application_name("nola-analytics");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);

        debug!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = config.max_connections,
            "PostgreSQL pool configured"
        );
        Self { pool }
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        self.pool.acquire().await.map_err(|e| {
            error!(error = %e, "Database connection unavailable");
            StoreError::unavailable(e)
        })
    }

    async fn fetch_named(&self, sql: &str) -> Result<Vec<NamedEntity>, StoreError> {
        let mut conn = self.acquire().await?;
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(StoreError::query)?;

        rows.iter()
            .map(|row| {
                Ok(NamedEntity {
                    id: row.try_get("id").map_err(StoreError::query)?,
                    name: row.try_get("name").map_err(StoreError::query)?,
                })
            })
            .collect()
    }

    async fn fetch_name(&self, sql: &str, id: i32) -> Result<Option<String>, StoreError> {
        let mut conn = self.acquire().await?;
        sqlx::query_scalar::<_, String>(sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(StoreError::query)
    }
}

/// Decode the grouping column, which is text for most dimensions and
/// INT4 for `hora_do_dia`
fn decode_label(row: &PgRow) -> Result<EntityLabel, StoreError> {
    if let Ok(text) = row.try_get::<Option<String>, _>(ENTITY_ALIAS) {
        return Ok(text.map_or(EntityLabel::Missing, EntityLabel::Text));
    }
    let number: Option<i32> = row.try_get(ENTITY_ALIAS).map_err(StoreError::query)?;
    Ok(number.map_or(EntityLabel::Missing, |n| EntityLabel::Number(i64::from(n))))
}

fn decode_customer(row: &PgRow) -> Result<CustomerAtRisk, sqlx::Error> {
    Ok(CustomerAtRisk {
        customer_name: row.try_get("customer_name")?,
        phone_number: row.try_get("phone_number")?,
        email: row.try_get("email")?,
        total_compras: row.try_get("total_compras")?,
        ultima_compra: row.try_get("ultima_compra")?,
        ltv_total: row.try_get("ltv_total")?,
        dias_desde_ultima_compra: row.try_get("dias_desde_ultima_compra")?,
    })
}

#[async_trait]
impl AnalyticsStore for PgStore {
    async fn aggregate(&self, query: &BuiltQuery) -> Result<Vec<AnalyticsRow>, StoreError> {
        let mut statement = sqlx::query(&query.sql);
        for param in &query.params {
            statement = match *param {
                SqlParam::Int(value) => statement.bind(value),
                SqlParam::Date(value) => statement.bind(value),
            };
        }

        let mut conn = self.acquire().await?;
        let rows = statement.fetch_all(&mut *conn).await.map_err(|e| {
            error!(error = %e, "Analytics query failed");
            StoreError::query(e)
        })?;

        rows.iter()
            .map(|row| {
                Ok(AnalyticsRow {
                    nome_entidade: decode_label(row)?,
                    valor_metrica: row.try_get(VALUE_ALIAS).map_err(StoreError::query)?,
                })
            })
            .collect()
    }

    async fn channels(&self) -> Result<Vec<NamedEntity>, StoreError> {
        self.fetch_named(CHANNELS_SQL).await
    }

    async fn active_stores(&self) -> Result<Vec<NamedEntity>, StoreError> {
        self.fetch_named(ACTIVE_STORES_SQL).await
    }

    async fn store_name(&self, id: i32) -> Result<Option<String>, StoreError> {
        self.fetch_name(STORE_NAME_SQL, id).await
    }

    async fn channel_name(&self, id: i32) -> Result<Option<String>, StoreError> {
        self.fetch_name(CHANNEL_NAME_SQL, id).await
    }

    async fn customers_at_risk(&self) -> Result<Vec<CustomerAtRisk>, StoreError> {
        let mut conn = self.acquire().await?;
        let rows = sqlx::query(CUSTOMERS_AT_RISK_SQL)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                error!(error = %e, "Customers-at-risk query failed");
                StoreError::query(e)
            })?;

        rows.iter()
            .map(|row| decode_customer(row).map_err(StoreError::query))
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("PostgreSQL pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PgStoreConfig {
        PgStoreConfig {
            host: "127.0.0.1".to_string(),
            // Nothing listens on port 1
            port: 1,
            database: "challenge_db".to_string(),
            user: "challenge".to_string(),
            password: "challenge_2024".to_string(),
            max_connections: 2,
            acquire_timeout: Duration::from_millis(300),
        }
    }

    #[tokio::test]
    async fn test_unreachable_database_is_unavailable_not_query_failure() {
        let store = PgStore::connect_lazy(&config());

        let err = store.channels().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{:?}", err);

        let built = crate::query::build(
            crate::registry::Metric::TotalDeVendas,
            crate::registry::Dimension::Loja,
            &crate::query::FilterSet::default(),
            Some(50),
        );
        let err = store.aggregate(&built).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{:?}", err);

        store.close().await;
    }

    #[test]
    fn test_customer_query_thresholds() {
        assert!(CUSTOMERS_AT_RISK_SQL.contains("k.total_compras >= 3"));
        assert!(CUSTOMERS_AT_RISK_SQL.contains("> 30"));
        assert!(CUSTOMERS_AT_RISK_SQL.contains("sale_status_desc = 'COMPLETED'"));
    }
}
