//! Error Recovery
//!
//! Builds the remediation guidance handed to the model on the single repair
//! attempt, chosen by the classified [`ErrorKind`].

use crate::execution_loop::error_classifier::ErrorKind;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref QUOTED_IDENT: Regex = Regex::new(r#"["'`]([A-Za-z_][A-Za-z0-9_]*)["'`]"#).unwrap();
    static ref WITH_CLAUSE: Regex = Regex::new(r"(?i)^\s*with\s+[A-Za-z_]").unwrap();
    static ref NESTED_SELECT: Regex = Regex::new(r"(?i)\(\s*select\b").unwrap();
    static ref TABLE_WITH_NAME: Regex = Regex::new(r"(?i)table with name ([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Minimum Jaro-Winkler similarity for a table to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.75;

pub struct ErrorRecovery;

impl ErrorRecovery {
    pub fn new() -> Self {
        Self
    }

    /// Guidance lines for repairing `failed_sql`, which failed with `error_message`.
    pub fn guidance(
        &self,
        kind: ErrorKind,
        error_message: &str,
        failed_sql: &str,
        tables: &[String],
    ) -> Vec<String> {
        let mut lines = Vec::new();

        match kind {
            ErrorKind::TypeMismatch => {
                lines.push(
                    "Add casts: wrap text columns used in SUM/AVG or numeric comparisons in \
                     CAST(column AS DOUBLE). If the column also holds non-numeric text, filter those \
                     rows out first, e.g. WHERE REGEXP_LIKE(column, '^-?[0-9]')."
                        .to_string(),
                );
                lines.push("Make sure both sides of every comparison and UNION have matching types.".to_string());
            }
            ErrorKind::DateParse => {
                lines.push(
                    "The date column contains values that are not dates (e.g. header text like 'SKU'). \
                     Filter them out FIRST: add WHERE REGEXP_LIKE(date_column, '^[0-9]') AND date_column IS NOT NULL."
                        .to_string(),
                );
                lines.push(
                    "No date-parsing functions exist (STRPTIME, TO_DATE, STRFTIME). Take date parts \
                     from the text with SUBSTR, using the example value in the schema: SUBSTR(date_column, 1, 2) \
                     is the month of '04-30-22', SUBSTR(date_column, 1, 7) the year-month of '2022-04-30'."
                        .to_string(),
                );
            }
            ErrorKind::Syntax => {
                lines.push("Check for missing commas, unmatched parentheses and misplaced keywords.".to_string());
                lines.push(
                    "For UNION ALL, every SELECT must return the same number of columns with matching types."
                        .to_string(),
                );
                lines.push("Use REGEXP_LIKE(column, pattern) instead of `column REGEXP pattern`.".to_string());
            }
            ErrorKind::UnresolvedReference => {
                lines.push(
                    "Use ONLY the table names from the Available tables list and the exact columns shown \
                     in the schema for each table."
                        .to_string(),
                );
                lines.push(
                    "If a referenced column does not exist in a table, do not drop it silently: select \
                     NULL AS <column_name> in its place so the result keeps the same shape."
                        .to_string(),
                );
                for suggestion in self.table_suggestions(error_message, tables) {
                    lines.push(suggestion);
                }
            }
            ErrorKind::UnknownFunction => {
                lines.push(
                    "Use the engine's native functions: ARRAY_TO_STRING(ARRAY_AGG(column), ', ') to \
                     concatenate strings and ARRAY_AGG(column) for list aggregation. STRING_AGG, GROUP_CONCAT, \
                     LISTAGG, LIST_AGGR and the date parsers STRPTIME, TO_DATE and STRFTIME do not exist."
                        .to_string(),
                );
            }
            ErrorKind::Other => {
                lines.push("Read the error above carefully and correct the part of the query it points at.".to_string());
            }
        }

        if is_composed_query(failed_sql) {
            lines.push(
                "The query uses WITH clauses or nested sub-queries. Replace them with a single flattened \
                 SELECT over the base tables; a CTE or sub-query alias is not a table."
                    .to_string(),
            );
        }

        lines
    }

    /// "Did you mean" hints for identifiers in the error that are not tables.
    fn table_suggestions(&self, error_message: &str, tables: &[String]) -> Vec<String> {
        let mut unknown: BTreeSet<String> = QUOTED_IDENT
            .captures_iter(error_message)
            .chain(TABLE_WITH_NAME.captures_iter(error_message))
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_lowercase()))
            .collect();
        unknown.retain(|name| !tables.contains(name));

        unknown
            .into_iter()
            .filter_map(|name| {
                nearest_table(&name, tables).map(|table| {
                    format!("`{}` is not a table; the closest valid table is `{}`.", name, table)
                })
            })
            .collect()
    }
}

impl Default for ErrorRecovery {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the query starts with a WITH clause or nests a SELECT in parentheses.
pub fn is_composed_query(sql: &str) -> bool {
    WITH_CLAUSE.is_match(sql) || NESTED_SELECT.is_match(sql)
}

/// The table whose name is most similar to `name`, if any is close enough.
pub fn nearest_table<'a>(name: &str, tables: &'a [String]) -> Option<&'a String> {
    tables
        .iter()
        .map(|t| (t, strsim::jaro_winkler(name, t)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(t, _)| t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> Vec<String> {
        vec!["amazon_sale_report".to_string(), "sale_report".to_string(), "orders".to_string()]
    }

    #[test]
    fn test_nearest_table() {
        let tables = tables();
        assert_eq!(nearest_table("order", &tables).map(String::as_str), Some("orders"));
        assert_eq!(nearest_table("amazon_sales", &tables).map(String::as_str), Some("amazon_sale_report"));
        assert!(nearest_table("zzz", &tables).is_none());
    }

    #[test]
    fn test_unresolved_guidance_suggests_table() {
        let lines = ErrorRecovery::new().guidance(
            ErrorKind::UnresolvedReference,
            "relation 'order' was not found",
            "SELECT * FROM order",
            &tables(),
        );
        assert!(lines.iter().any(|l| l.contains("NULL AS <column_name>")));
        assert!(lines.iter().any(|l| l.contains("closest valid table is `orders`")));
    }

    #[test]
    fn test_cte_guidance() {
        let sql = "WITH top AS (SELECT * FROM orders) SELECT * FROM top_categories";
        assert!(is_composed_query(sql));
        let lines = ErrorRecovery::new().guidance(ErrorKind::UnresolvedReference, "not found", sql, &tables());
        assert!(lines.iter().any(|l| l.contains("single flattened SELECT")));
    }

    #[test]
    fn test_nested_subquery_is_composed() {
        let sql = "SELECT region, total FROM (SELECT region, SUM(amount) AS total FROM orders GROUP BY region) t";
        assert!(is_composed_query(sql));
        let lines = ErrorRecovery::new().guidance(ErrorKind::UnresolvedReference, "column 't.total' not found", sql, &tables());
        assert!(lines.iter().any(|l| l.contains("single flattened SELECT")));
        assert!(is_composed_query("SELECT * FROM orders WHERE id IN ( SELECT id FROM returns )"));
    }

    #[test]
    fn test_type_and_date_guidance() {
        let recovery = ErrorRecovery::new();
        let cast = recovery.guidance(ErrorKind::TypeMismatch, "`sum` operation not supported for dtype `str`", "SELECT SUM(amount) FROM orders", &tables());
        assert!(cast[0].contains("CAST(column AS DOUBLE)"));
        let date = recovery.guidance(ErrorKind::DateParse, "could not parse", "SELECT 1", &tables());
        assert!(date[0].contains("^[0-9]"));
        assert!(date[1].contains("SUBSTR(date_column, 1, 2)"));
        assert!(!date.iter().any(|l| l.contains("STRPTIME(")));
        let func = recovery.guidance(ErrorKind::UnknownFunction, "unsupported SQL function: string_agg", "SELECT 1", &tables());
        assert!(func[0].contains("ARRAY_TO_STRING(ARRAY_AGG(column), ', ')"));
        assert!(!is_composed_query("SELECT 1"));
    }
}
