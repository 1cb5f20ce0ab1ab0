//! Result export
//!
//! The JSON path needs no shaping: [`AnalyticsRow`] already serializes with
//! the generic `nome_entidade` / `valor_metrica` field names. This module
//! renders the human-readable CSV report: a metadata block describing the
//! applied filters, then the rows with the metric and dimension report
//! labels as column names.
//!
//! Locale follows the Brazilian spreadsheet convention: `;` between fields
//! and `,` as decimal separator.

use std::borrow::Cow;
use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::query::WeekdayIndex;
use crate::registry::{Dimension, Metric};
use crate::store::AnalyticsRow;

/// Field separator
pub const FIELD_SEPARATOR: char = ';';

/// Decimal separator
pub const DECIMAL_SEPARATOR: char = ',';

/// MIME type of the download
pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const ALL_STORES: &str = "Todas as Lojas";
const ALL_CHANNELS: &str = "Todos os Canais";
const ALL_DAYS: &str = "Todos os Dias";
const UNBOUNDED_START: &str = "Inicio";
const UNBOUNDED_END: &str = "Fim";

/// Filters as shown in the report header, with ids already resolved to names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedFilters {
    /// Store display name
    pub store_name: Option<String>,
    /// Channel display name
    pub channel_name: Option<String>,
    /// Weekday filter
    pub weekday: Option<WeekdayIndex>,
    /// Start of the date range
    pub date_from: Option<NaiveDate>,
    /// End of the date range
    pub date_to: Option<NaiveDate>,
}

/// CSV report for one analytics request
#[derive(Debug, Clone)]
pub struct CsvReport {
    /// Day the report was generated
    pub generated_on: NaiveDate,
    /// Aggregated metric
    pub metric: Metric,
    /// Grouping dimension
    pub dimension: Dimension,
    /// Filters applied to the query
    pub filters: AppliedFilters,
}

impl CsvReport {
    /// Download file name, `relatorio_nola_YYYY-MM-DD.csv`
    pub fn filename(&self) -> String {
        format!("relatorio_nola_{}.csv", self.generated_on.format("%Y-%m-%d"))
    }

    /// `Content-Disposition` header value
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename={}", self.filename())
    }

    /// Metadata block that precedes the table
    pub fn header(&self) -> String {
        let f = &self.filters;
        let date = |d: Option<NaiveDate>, sentinel: &str| {
            d.map_or_else(|| sentinel.to_string(), |d| d.format("%Y-%m-%d").to_string())
        };

        let mut out = String::new();
        let _ = writeln!(
            out,
            "Relatorio Nola Gerado em: {}",
            self.generated_on.format("%Y-%m-%d")
        );
        out.push('\n');
        out.push_str("Filtros Aplicados:\n");
        let _ = writeln!(out, "Metrica: {}", self.metric.report_label());
        let _ = writeln!(out, "Agrupado Por: {}", self.dimension.report_label());
        let _ = writeln!(out, "Loja: {}", f.store_name.as_deref().unwrap_or(ALL_STORES));
        let _ = writeln!(
            out,
            "Canal: {}",
            f.channel_name.as_deref().unwrap_or(ALL_CHANNELS)
        );
        let _ = writeln!(
            out,
            "Dia da Semana: {}",
            f.weekday.map_or(ALL_DAYS, WeekdayIndex::name)
        );
        let _ = writeln!(out, "De: {}", date(f.date_from, UNBOUNDED_START));
        let _ = writeln!(out, "Ate: {}", date(f.date_to, UNBOUNDED_END));
        out.push('\n');
        out
    }

    /// Full report: metadata block, column header, rows
    pub fn render(&self, rows: &[AnalyticsRow]) -> String {
        let mut out = self.header();

        let _ = writeln!(
            out,
            "{}{}{}",
            escape_field(self.dimension.report_label()),
            FIELD_SEPARATOR,
            escape_field(self.metric.report_label())
        );
        for row in rows {
            let label = row.nome_entidade.to_string();
            let value = row.valor_metrica.map(format_decimal).unwrap_or_default();
            let _ = writeln!(out, "{}{}{}", escape_field(&label), FIELD_SEPARATOR, value);
        }
        out
    }
}

/// Render a number with `,` as decimal separator; non-finite values are empty
pub fn format_decimal(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    value.to_string().replace('.', &DECIMAL_SEPARATOR.to_string())
}

/// Quote a field if it holds the separator, a quote or a line break
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([FIELD_SEPARATOR, '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
