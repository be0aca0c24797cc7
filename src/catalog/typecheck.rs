//! Numeric aggregates over text columns
//!
//! The SQL engine evaluates `SUM`/`AVG` over a string column to a null
//! instead of failing. This check turns that case into an execution error
//! so the repair loop gets a chance to add the cast.

use crate::catalog::SchemaCatalog;
use crate::error::QueryExecutionError;
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref NUMERIC_AGGREGATE: Regex = Regex::new(
        r"(?i)\b(SUM|AVG|MEAN|MEDIAN|STDDEV|VARIANCE)\s*\(\s*(?:DISTINCT\s+)?(?:[A-Za-z_][A-Za-z0-9_]*\.)?([A-Za-z_][A-Za-z0-9_]*)\s*\)"
    )
    .unwrap();
    static ref IDENTIFIER: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
    static ref ALIAS: Regex = Regex::new(r"(?i)\bAS\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Reject `sql` when it applies a numeric aggregate directly to a text column
/// of a table it references.
///
/// Columns re-bound by an `AS` alias are skipped, since the aggregate may run
/// over the cast value rather than the stored text.
pub fn check_numeric_aggregates(catalog: &SchemaCatalog, sql: &str) -> Result<(), QueryExecutionError> {
    let identifiers: HashSet<String> = IDENTIFIER
        .find_iter(sql)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    let aliases: HashSet<String> = ALIAS
        .captures_iter(sql)
        .map(|c| c[1].to_lowercase())
        .collect();

    let referenced: Vec<(&str, &DataFrame)> = catalog
        .table_records()
        .filter(|t| identifiers.contains(&t.name.to_lowercase()))
        .filter_map(|t| catalog.frame(&t.name).map(|df| (t.name.as_str(), df)))
        .collect();

    for captures in NUMERIC_AGGREGATE.captures_iter(sql) {
        let function = captures[1].to_uppercase();
        let column = captures[2].to_lowercase();
        if aliases.contains(&column) {
            continue;
        }
        for (table, df) in &referenced {
            let text_column = df
                .get_columns()
                .iter()
                .find(|s| s.name().to_lowercase() == column && s.dtype() == &DataType::String);
            if let Some(series) = text_column {
                return Err(QueryExecutionError::new(format!(
                    "type mismatch: {}({}) over text column '{}' (str) of table '{}'; \
                     cast it first, e.g. {}(CAST({} AS DOUBLE))",
                    function,
                    series.name(),
                    series.name(),
                    table,
                    function,
                    series.name()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableSource;
    use crate::config::CatalogSettings;

    fn catalog() -> SchemaCatalog {
        let orders = df! {
            "order_id" => &[1i64, 2, 3],
            "amount" => &["19.99", "Amount", "10.01"],
            "order_date" => &["04-30-22", "SKU", "05-01-22"],
        }
        .unwrap();
        let stock = df! {
            "sku" => &["S1", "S2"],
            "units" => &[10i64, 20],
        }
        .unwrap();
        SchemaCatalog::load(
            vec![
                TableSource::Frame {
                    origin: "orders.csv".to_string(),
                    frame: orders,
                },
                TableSource::Frame {
                    origin: "stock.csv".to_string(),
                    frame: stock,
                },
            ],
            CatalogSettings::default(),
        )
    }

    #[test]
    fn test_sum_over_text_is_rejected() {
        let catalog = catalog();
        let err = check_numeric_aggregates(&catalog, "SELECT SUM(amount) AS total FROM orders").unwrap_err();
        assert!(err.message.starts_with("type mismatch: SUM(amount)"), "{}", err);
        assert!(err.message.contains("SUM(CAST(amount AS DOUBLE))"));

        let err = check_numeric_aggregates(&catalog, "select avg( o.amount ) from orders o").unwrap_err();
        assert!(err.message.contains("AVG(amount)"));
    }

    #[test]
    fn test_cast_and_numeric_columns_pass() {
        let catalog = catalog();
        assert!(check_numeric_aggregates(
            &catalog,
            "SELECT SUM(CAST(amount AS DOUBLE)) FROM orders WHERE REGEXP_LIKE(order_date, '^[0-9]')"
        )
        .is_ok());
        assert!(check_numeric_aggregates(&catalog, "SELECT SUM(units) FROM stock").is_ok());
        assert!(check_numeric_aggregates(&catalog, "SELECT COUNT(amount) FROM orders").is_ok());
    }

    #[test]
    fn test_unreferenced_or_aliased_columns_pass() {
        let catalog = catalog();
        // `amount` is text only in `orders`, which this query never reads
        assert!(check_numeric_aggregates(&catalog, "SELECT SUM(amount) FROM stock").is_ok());
        assert!(check_numeric_aggregates(
            &catalog,
            "SELECT SUM(amount) FROM (SELECT CAST(amount AS DOUBLE) AS amount FROM orders) t"
        )
        .is_ok());
    }
}
