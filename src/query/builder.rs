//! Parameterized aggregation builder
//!
//! Turns a metric, a dimension and a filter set into a single
//! `SELECT ... GROUP BY ... ORDER BY` statement over `sales v`, plus the
//! values to bind. Filter values only ever travel as `$n` parameters; the
//! SQL text is assembled exclusively from registry fragments.

use std::fmt::Write as _;

use chrono::NaiveDate;

use super::FilterSet;
use crate::registry::{Dimension, Metric};

/// Relation every analytics query reads from
pub const BASE_TABLE: &str = "sales v";

/// Predicate restricting aggregates to completed sales
pub const COMPLETED_PREDICATE: &str = "v.sale_status_desc = 'COMPLETED'";

/// Output alias of the aggregate column
pub const VALUE_ALIAS: &str = "valor_metrica";

/// Value bound to a `$n` placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlParam {
    /// INT4 parameter (ids, weekday index)
    Int(i32),
    /// DATE parameter
    Date(NaiveDate),
}

/// SQL text plus parameters in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    /// Statement with `$1..$n` placeholders
    pub sql: String,
    /// Bound values, `params[i]` fills `$(i + 1)`
    pub params: Vec<SqlParam>,
}

/// Collects AND-ed predicates and numbers their placeholders
struct Predicates {
    clauses: Vec<String>,
    params: Vec<SqlParam>,
}

impl Predicates {
    fn new() -> Self {
        Self {
            clauses: vec![COMPLETED_PREDICATE.to_string()],
            params: Vec::new(),
        }
    }

    /// Append `<lhs> <op> $n` and bind `value` to it
    fn bind(&mut self, lhs: &str, op: &str, value: SqlParam) {
        self.params.push(value);
        self.clauses
            .push(format!("{} {} ${}", lhs, op, self.params.len()));
    }

    fn raw(&mut self, clause: String) {
        self.clauses.push(clause);
    }
}

/// Build the aggregation for `metric` grouped by `dimension`
///
/// `limit` is appended as `LIMIT n` for dashboard callers; exports pass
/// `None` and get the complete result set.
pub fn build(
    metric: Metric,
    dimension: Dimension,
    filters: &FilterSet,
    limit: Option<u32>,
) -> BuiltQuery {
    let metric_spec = metric.spec();
    let dimension_spec = dimension.spec();

    let mut predicates = Predicates::new();
    if let Some(channel_id) = filters.channel_id {
        predicates.bind("v.channel_id", "=", SqlParam::Int(channel_id));
    }
    if let Some(store_id) = filters.store_id {
        predicates.bind("v.store_id", "=", SqlParam::Int(store_id));
    }
    if let Some(weekday) = filters.weekday {
        predicates.bind(
            "EXTRACT(DOW FROM v.created_at)",
            "=",
            SqlParam::Int(i32::from(weekday.get())),
        );
    }
    if let Some(date_from) = filters.date_from {
        predicates.bind("CAST(v.created_at AS DATE)", ">=", SqlParam::Date(date_from));
    }
    if let Some(date_to) = filters.date_to {
        predicates.bind("CAST(v.created_at AS DATE)", "<=", SqlParam::Date(date_to));
    }
    if let Some(column) = metric_spec.required_column {
        predicates.raw(format!("{} IS NOT NULL", column));
    }

    let mut sql = format!(
        "SELECT {dim} AS {alias}, CAST({metric} AS DOUBLE PRECISION) AS {value} FROM {table}",
        dim = dimension_spec.expr,
        alias = dimension_spec.alias,
        metric = metric_spec.expr,
        value = VALUE_ALIAS,
        table = BASE_TABLE,
    );
    if let Some(join) = dimension_spec.join {
        sql.push(' ');
        sql.push_str(join);
    }
    sql.push_str(" WHERE ");
    sql.push_str(&predicates.clauses.join(" AND "));
    // Writing to a String cannot fail
    let _ = write!(
        sql,
        " GROUP BY {} ORDER BY {} DESC",
        dimension_spec.expr, VALUE_ALIAS
    );
    if let Some(limit) = limit {
        let _ = write!(sql, " LIMIT {}", limit);
    }

    BuiltQuery {
        sql,
        params: predicates.params,
    }
}
