//! Type normalization applied to every loaded frame
//!
//! The numeric coercion is a heuristic: it looks at a sample of non-null
//! values only, so a text column whose first rows look numeric can still
//! hold text further down. Those later values become null, never an error.

use crate::catalog::sanitize::sanitize_unique;
use crate::config::CatalogSettings;
use crate::error::Result;
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref NUMERIC_TEXT: Regex = Regex::new(r"^-?\d+\.?\d*$").unwrap();
}

/// Rename columns to sanitized identifiers, then normalize column types.
///
/// Renaming runs first so type decisions are logged under the final names.
pub fn normalize_frame(mut df: DataFrame, settings: &CatalogSettings) -> Result<DataFrame> {
    let raw_names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let clean_names = sanitize_unique(&raw_names);
    df.set_column_names(clean_names.as_slice())?;

    for name in &clean_names {
        let series = df.column(name)?.clone();
        if let Some(normalized) = normalize_series(&series, settings.numeric_sample_size)? {
            df.with_column(normalized)?;
        }
    }

    Ok(df)
}

/// Returns a replacement series when the column needs a type change.
fn normalize_series(series: &Series, sample_size: usize) -> Result<Option<Series>> {
    let dtype = series.dtype();

    if dtype.is_integer() && series.null_count() > 0 {
        debug!("Filling {} nulls with 0 in integer column '{}'", series.null_count(), series.name());
        return Ok(Some(series.fill_null(FillNullStrategy::Zero)?));
    }

    if dtype == &DataType::String && looks_numeric(series, sample_size)? {
        debug!("Coercing numeric-looking text column '{}' to f64", series.name());
        return Ok(Some(series.cast(&DataType::Float64)?));
    }

    Ok(None)
}

/// True when the first `sample_size` non-null values all look like numbers.
fn looks_numeric(series: &Series, sample_size: usize) -> Result<bool> {
    let values = series.str()?;
    let sample: Vec<&str> = values.into_iter().flatten().take(sample_size).collect();
    Ok(!sample.is_empty() && sample.iter().all(|v| NUMERIC_TEXT.is_match(v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_sanitized_before_typing() {
        let df = df![
            "Order ID" => ["1", "2", "3"],
            "Ship-City" => ["Pune", "Delhi", "Goa"]
        ]
        .unwrap();

        let out = normalize_frame(df, &CatalogSettings::default()).unwrap();
        assert_eq!(out.get_column_names(), &["order_id", "ship_city"]);
        assert_eq!(out.column("order_id").unwrap().dtype(), &DataType::Float64);
        assert_eq!(out.column("ship_city").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_integer_nulls_become_zero() {
        let df = df!["qty" => [Some(1i64), None, Some(3)]].unwrap();
        let out = normalize_frame(df, &CatalogSettings::default()).unwrap();
        let qty = out.column("qty").unwrap();
        assert_eq!(qty.null_count(), 0);
        assert_eq!(qty.i64().unwrap().get(1), Some(0));
    }

    #[test]
    fn test_unparsable_tail_becomes_null() {
        let settings = CatalogSettings {
            numeric_sample_size: 2,
            ..CatalogSettings::default()
        };
        let df = df!["amount" => ["19.99", "5", "Amount"]].unwrap();
        let out = normalize_frame(df, &settings).unwrap();
        let amount = out.column("amount").unwrap();
        assert_eq!(amount.dtype(), &DataType::Float64);
        assert_eq!(amount.null_count(), 1);
    }

    #[test]
    fn test_mixed_text_stays_text() {
        let df = df!["order_date" => ["04-30-22", "SKU", "05-01-22"]].unwrap();
        let out = normalize_frame(df, &CatalogSettings::default()).unwrap();
        assert_eq!(out.column("order_date").unwrap().dtype(), &DataType::String);
    }
}
