//! Table profiling: summary statistics, column search and quick insights

use crate::catalog::SchemaCatalog;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const AMOUNT_TERMS: &[&str] = &["amount", "amt", "revenue", "sales", "gross", "rate", "mrp", "price"];
const QUANTITY_TERMS: &[&str] = &["qty", "quantity", "pcs", "stock", "count"];

/// Count, sum, mean, min and max of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub sum: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    /// `None` for non-numeric columns.
    pub fn of(series: &Series) -> Result<Option<Self>> {
        if !series.dtype().is_numeric() {
            return Ok(None);
        }
        let floats = series.cast(&DataType::Float64)?;
        let values = floats.f64()?;
        let count = values.len() - values.null_count();
        let sum = values.sum().unwrap_or(0.0);

        Ok(Some(Self {
            count,
            sum,
            mean: if count > 0 { Some(sum / count as f64) } else { None },
            min: values.min(),
            max: values.max(),
        }))
    }
}

/// Per-table profile used by the explorer and by `insights`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSummary {
    pub total_rows: usize,
    pub total_columns: usize,
    pub missing_values: BTreeMap<String, usize>,
    pub column_types: BTreeMap<String, String>,
    pub numeric_summary: BTreeMap<String, NumericSummary>,
}

/// Numeric summaries for every numeric column of a frame, in column order.
pub fn numeric_summaries(df: &DataFrame) -> Result<Vec<(String, NumericSummary)>> {
    let mut out = Vec::new();
    for series in df.get_columns() {
        if let Some(summary) = NumericSummary::of(series)? {
            out.push((series.name().to_string(), summary));
        }
    }
    Ok(out)
}

impl SchemaCatalog {
    pub fn summary_statistics(&self, table: &str) -> Result<Option<TableSummary>> {
        let df = match self.frame(table) {
            Some(df) => df,
            None => return Ok(None),
        };

        let mut missing_values = BTreeMap::new();
        let mut column_types = BTreeMap::new();
        for series in df.get_columns() {
            missing_values.insert(series.name().to_string(), series.null_count());
            column_types.insert(series.name().to_string(), series.dtype().to_string());
        }

        Ok(Some(TableSummary {
            total_rows: df.height(),
            total_columns: df.width(),
            missing_values,
            column_types,
            numeric_summary: numeric_summaries(df)?.into_iter().collect(),
        }))
    }

    /// Columns whose name contains `keyword` (case-insensitive), per table.
    pub fn search_columns(&self, keyword: &str) -> BTreeMap<String, Vec<String>> {
        let needle = keyword.to_lowercase();
        self.table_records()
            .filter_map(|table| {
                let matches: Vec<String> = table
                    .columns
                    .iter()
                    .filter(|c| c.name.to_lowercase().contains(&needle))
                    .map(|c| c.name.clone())
                    .collect();
                if matches.is_empty() {
                    None
                } else {
                    Some((table.name.clone(), matches))
                }
            })
            .collect()
    }

    /// Totals and averages for amount-like columns, totals for quantity-like ones.
    pub fn generate_insights(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut insights = BTreeMap::new();

        for table in self.table_records() {
            let df = match self.frame(&table.name) {
                Some(df) => df,
                None => continue,
            };
            let mut lines = Vec::new();

            for (column, summary) in numeric_summaries(df)? {
                let lowered = column.to_lowercase();
                if AMOUNT_TERMS.iter().any(|t| lowered.contains(t)) {
                    lines.push(format!(
                        "Total {}: {:.2}, Average: {:.2}",
                        column,
                        summary.sum,
                        summary.mean.unwrap_or(0.0)
                    ));
                } else if QUANTITY_TERMS.iter().any(|t| lowered.contains(t)) {
                    lines.push(format!("Total {}: {:.0}", column, summary.sum));
                }
            }

            insights.insert(table.name.clone(), lines);
        }

        Ok(insights)
    }
}
