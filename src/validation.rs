//! Result Validator - data-quality report for a query result

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub row_count: usize,
    pub column_count: usize,
    /// Null percentage per column, in result column order.
    pub null_percentage_by_column: Vec<(String, f64)>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    pub fn null_percentage(&self, column: &str) -> Option<f64> {
        self.null_percentage_by_column
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, pct)| *pct)
    }
}

/// Inspects results for emptiness, null density and size. Never fails.
#[derive(Debug, Clone)]
pub struct ResultValidator {
    large_result_threshold: usize,
    null_warning_percentage: f64,
}

impl ResultValidator {
    pub fn new(large_result_threshold: usize, null_warning_percentage: f64) -> Self {
        Self {
            large_result_threshold,
            null_warning_percentage,
        }
    }

    pub fn validate(&self, result: &DataFrame) -> ValidationReport {
        let row_count = result.height();
        let column_count = result.width();

        if row_count == 0 {
            return ValidationReport {
                is_valid: false,
                row_count,
                column_count,
                null_percentage_by_column: Vec::new(),
                warnings: vec!["No data returned from query".to_string()],
                recommendations: vec!["Check if the query matches available data".to_string()],
            };
        }

        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        let null_percentage_by_column: Vec<(String, f64)> = result
            .get_columns()
            .iter()
            .map(|s| {
                let pct = s.null_count() as f64 / row_count as f64 * 100.0;
                (s.name().to_string(), pct)
            })
            .collect();

        for (column, pct) in &null_percentage_by_column {
            if *pct > self.null_warning_percentage {
                warnings.push(format!("Column '{}' has {:.1}% null values", column, pct));
            }
        }

        if row_count > self.large_result_threshold {
            warnings.push("Large result set - consider adding filters".to_string());
            recommendations.push("Add filters or aggregation to narrow the result".to_string());
        }

        ValidationReport {
            is_valid: true,
            row_count,
            column_count,
            null_percentage_by_column,
            warnings,
            recommendations,
        }
    }
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::new(10_000, 50.0)
    }
}
