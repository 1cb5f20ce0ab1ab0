//! Whitelist registry of metrics and dimensions
//!
//! The set of metrics and dimensions a client may request is closed: each is
//! an enum variant with an exhaustive mapping to the SQL fragment, join and
//! report label it stands for. Tokens coming off the wire are resolved here,
//! and anything not listed is rejected before a query is assembled.
//!
//! Adding a metric or dimension is a code change, not a runtime one.

use std::fmt;
use std::str::FromStr;


use crate::query::QueryError;

/// Output alias of the grouping column in every analytics query
pub const ENTITY_ALIAS: &str = "nome_entidade";

/// Weekday display names indexed by `EXTRACT(DOW ...)` (0 = Sunday)
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Domingo",
    "Segunda-feira",
    "Terça-feira",
    "Quarta-feira",
    "Quinta-feira",
    "Sexta-feira",
    "Sábado",
];

/// Display name for a weekday index, `None` outside 0..=6
pub fn weekday_name(index: u8) -> Option<&'static str> {
    WEEKDAY_NAMES.get(index as usize).copied()
}

// =============================================================================
// Metrics
// =============================================================================

/// Aggregate computed over completed sales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Total revenue
    FaturamentoTotal,
    /// Number of sales
    TotalDeVendas,
    /// Average ticket
    TicketMedio,
    /// Average delivery time in minutes
    TempoEntregaMin,
}

/// Resolved SQL fragments for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    /// Aggregate expression over the `sales v` relation
    pub expr: &'static str,
    /// Column that must be non-null for the aggregate to be meaningful
    pub required_column: Option<&'static str>,
    /// Human-readable label used in reports
    pub report_label: &'static str,
}

impl Metric {
    /// Every registered metric
    pub const ALL: [Metric; 4] = [
        Metric::FaturamentoTotal,
        Metric::TotalDeVendas,
        Metric::TicketMedio,
        Metric::TempoEntregaMin,
    ];

    /// Resolve a wire token
    pub fn from_token(token: &str) -> Result<Self, QueryError> {
        Self::ALL
            .into_iter()
            .find(|m| m.token() == token)
            .ok_or_else(|| QueryError::InvalidMetric(token.to_string()))
    }

    /// Wire token for this metric
    pub fn token(self) -> &'static str {
        match self {
            Metric::FaturamentoTotal => "faturamento_total",
            Metric::TotalDeVendas => "total_de_vendas",
            Metric::TicketMedio => "ticket_medio",
            Metric::TempoEntregaMin => "tempo_entrega_min",
        }
    }

    /// SQL fragments and label
    pub fn spec(self) -> MetricSpec {
        match self {
            Metric::FaturamentoTotal => MetricSpec {
                expr: "SUM(v.total_amount)",
                required_column: None,
                report_label: "Faturamento Total (R$)",
            },
            Metric::TotalDeVendas => MetricSpec {
                expr: "COUNT(v.id)",
                required_column: None,
                report_label: "Total de Vendas",
            },
            Metric::TicketMedio => MetricSpec {
                expr: "AVG(v.total_amount)",
                required_column: None,
                report_label: "Ticket Médio (R$)",
            },
            Metric::TempoEntregaMin => MetricSpec {
                expr: "AVG(v.delivery_seconds) / 60.0",
                required_column: Some("v.delivery_seconds"),
                report_label: "Tempo Médio de Entrega (min)",
            },
        }
    }

    /// Label used in CSV reports
    pub fn report_label(self) -> &'static str {
        self.spec().report_label
    }
}

impl FromStr for Metric {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// =============================================================================
// Dimensions
// =============================================================================

/// Grouping axis for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// By store
    Loja,
    /// By sales channel
    Canal,
    /// By product (through the product_sales join table)
    Produto,
    /// By weekday name
    DiaDaSemana,
    /// By hour of day (0-23)
    HoraDoDia,
}

/// Resolved SQL fragments for a dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSpec {
    /// Grouping expression, emitted identically in SELECT and GROUP BY
    pub expr: &'static str,
    /// Join clause needed to reach the grouping column
    pub join: Option<&'static str>,
    /// Output alias of the grouping column
    pub alias: &'static str,
    /// Human-readable label used in reports
    pub report_label: &'static str,
}

const WEEKDAY_CASE: &str = "CASE EXTRACT(DOW FROM v.created_at) \
    WHEN 0 THEN 'Domingo' \
    WHEN 1 THEN 'Segunda-feira' \
    WHEN 2 THEN 'Terça-feira' \
    WHEN 3 THEN 'Quarta-feira' \
    WHEN 4 THEN 'Quinta-feira' \
    WHEN 5 THEN 'Sexta-feira' \
    WHEN 6 THEN 'Sábado' END";

impl Dimension {
    /// Every registered dimension
    pub const ALL: [Dimension; 5] = [
        Dimension::Loja,
        Dimension::Canal,
        Dimension::Produto,
        Dimension::DiaDaSemana,
        Dimension::HoraDoDia,
    ];

    /// Resolve a wire token
    pub fn from_token(token: &str) -> Result<Self, QueryError> {
        Self::ALL
            .into_iter()
            .find(|d| d.token() == token)
            .ok_or_else(|| QueryError::InvalidDimension(token.to_string()))
    }

    /// Wire token for this dimension
    pub fn token(self) -> &'static str {
        match self {
            Dimension::Loja => "loja",
            Dimension::Canal => "canal",
            Dimension::Produto => "produto",
            Dimension::DiaDaSemana => "dia_da_semana",
            Dimension::HoraDoDia => "hora_do_dia",
        }
    }

    /// SQL fragments and label
    pub fn spec(self) -> DimensionSpec {
        match self {
            Dimension::Loja => DimensionSpec {
                expr: "s.name",
                join: Some("JOIN stores s ON v.store_id = s.id"),
                alias: ENTITY_ALIAS,
                report_label: "Loja",
            },
            Dimension::Canal => DimensionSpec {
                expr: "c.name",
                join: Some("JOIN channels c ON v.channel_id = c.id"),
                alias: ENTITY_ALIAS,
                report_label: "Canal",
            },
            Dimension::Produto => DimensionSpec {
                expr: "p.name",
                join: Some(
                    "JOIN product_sales ps ON ps.sale_id = v.id \
                     JOIN products p ON ps.product_id = p.id",
                ),
                alias: ENTITY_ALIAS,
                report_label: "Produto",
            },
            Dimension::DiaDaSemana => DimensionSpec {
                expr: WEEKDAY_CASE,
                join: None,
                alias: ENTITY_ALIAS,
                report_label: "Dia da Semana",
            },
            Dimension::HoraDoDia => DimensionSpec {
                expr: "EXTRACT(HOUR FROM v.created_at)::INTEGER",
                join: None,
                alias: ENTITY_ALIAS,
                report_label: "Hora do Dia",
            },
        }
    }

    /// Label used in CSV reports
    pub fn report_label(self) -> &'static str {
        self.spec().report_label
    }
}

impl FromStr for Dimension {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_tokens_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_token(metric.token()), Ok(metric));
        }
    }

    #[test]
    fn test_dimension_tokens_round_trip() {
        for dimension in Dimension::ALL {
            assert_eq!(dimension.token().parse::<Dimension>(), Ok(dimension));
        }
    }

    #[test]
    fn test_unknown_tokens_rejected() {
        assert_eq!(
            Metric::from_token("lucro"),
            Err(QueryError::InvalidMetric("lucro".to_string()))
        );
        assert_eq!(
            Dimension::from_token("cidade"),
            Err(QueryError::InvalidDimension("cidade".to_string()))
        );
        // Tokens are matched exactly, no case folding or trimming
        assert!(Metric::from_token("Faturamento_Total").is_err());
        assert!(Dimension::from_token(" loja").is_err());
    }

    #[test]
    fn test_injection_attempt_is_just_an_unknown_token() {
        let err = Metric::from_token("SUM(v.id); DROP TABLE sales; --").unwrap_err();
        assert!(matches!(err, QueryError::InvalidMetric(_)));
    }

    #[test]
    fn test_only_delivery_metric_has_side_condition() {
        for metric in Metric::ALL {
            let spec = metric.spec();
            if metric == Metric::TempoEntregaMin {
                assert_eq!(spec.required_column, Some("v.delivery_seconds"));
            } else {
                assert!(spec.required_column.is_none());
            }
        }
    }

    #[test]
    fn test_dimensions_share_entity_alias() {
        for dimension in Dimension::ALL {
            assert_eq!(dimension.spec().alias, ENTITY_ALIAS);
        }
    }

    #[test]
    fn test_weekday_names() {
        assert_eq!(weekday_name(0), Some("Domingo"));
        assert_eq!(weekday_name(6), Some("Sábado"));
        assert_eq!(weekday_name(7), None);
    }
}
