//! Schema description rendered for the language model
//!
//! This text is the only grounding the model gets for SQL generation, so it
//! names every table explicitly and nothing else.

use crate::catalog::{SchemaCatalog, Table};
use itertools::Itertools;
use polars::prelude::*;
use std::fmt::Write;

/// Column names that hint at a date or time value.
pub fn is_temporal_name(column: &str) -> bool {
    let lowered = column.to_lowercase();
    lowered.contains("date") || lowered.contains("time")
}

/// `12345` -> `12,345`
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Render a cell without the quoting polars applies to strings.
pub fn any_value_text(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn render(catalog: &SchemaCatalog) -> String {
    let mut out = String::new();
    let names = catalog.tables();

    out.push_str("# Available Tables and Schema\n\n");
    out.push_str(
        "**IMPORTANT**: Only use the exact table names listed below. \
         Do NOT create or assume any other table name.\n\n",
    );
    let _ = writeln!(out, "**Total tables available: {}**\n", names.len());

    if names.is_empty() {
        out.push_str("No tables are loaded. There is no data to query.\n");
        return out;
    }

    for table in catalog.table_records() {
        render_table(&mut out, catalog, table);
    }

    out.push_str("\n---\n");
    let _ = writeln!(
        out,
        "**REMINDER**: The ONLY valid table names are: {}. \
         Never invent table names; a name not in this list does not exist.",
        names.iter().map(|n| format!("`{}`", n)).join(", ")
    );
    out
}

fn render_table(out: &mut String, catalog: &SchemaCatalog, table: &Table) {
    let _ = writeln!(out, "## Table: `{}`", table.name);
    let _ = writeln!(out, "- Original source: {}", table.origin);
    let _ = writeln!(out, "- Rows: {}", format_count(table.row_count));
    let _ = writeln!(
        out,
        "- Columns ({}): {}\n",
        table.columns.len(),
        table.columns.iter().map(|c| format!("`{}`", c.name)).join(", ")
    );

    let frame = catalog.frame(&table.name);
    let mut date_columns = Vec::new();

    out.push_str("Column types:\n");
    for column in &table.columns {
        let _ = write!(out, "  - `{}`: {}", column.name, column.dtype);
        if is_temporal_name(&column.name) {
            if let Some(example) = frame.and_then(|df| first_non_null(df, &column.name)) {
                let _ = write!(out, " (example: \"{}\")", example);
                date_columns.push(format!("`{}`", column.name));
            }
        }
        out.push('\n');
    }

    if !date_columns.is_empty() {
        let _ = writeln!(out, "\n**Date columns detected**: {}", date_columns.join(", "));
        out.push_str(
            "Note: these are text and may hold non-date values. Keep only rows starting with a digit \
             (REGEXP_LIKE(col, '^[0-9]')), then take date parts with SUBSTR following the example.\n",
        );
    }
    out.push('\n');

    let sample = catalog.sample_rows(&table.name, catalog.settings().sample_rows_in_schema);
    if sample.height() > 0 {
        let _ = writeln!(out, "Sample data (first {} rows, one JSON object per row):\n```", sample.height());
        match frame_rows(&sample) {
            Ok(rows) => {
                for row in rows {
                    let _ = writeln!(out, "{}", row);
                }
            }
            Err(e) => {
                let _ = writeln!(out, "(sample unavailable: {})", e);
            }
        }
        out.push_str("```\n\n");
    }
}

/// Rows of `df` as JSON objects keyed by column name. Every column is kept.
pub fn frame_rows(df: &DataFrame) -> PolarsResult<Vec<serde_json::Value>> {
    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut row = serde_json::Map::new();
        for series in df.get_columns() {
            let value = series.get(row_idx)?;
            row.insert(series.name().to_string(), cell_json(&value));
        }
        rows.push(serde_json::Value::Object(row));
    }
    Ok(rows)
}

pub fn cell_json(value: &AnyValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::Int8(i) => Value::from(*i),
        AnyValue::Int16(i) => Value::from(*i),
        AnyValue::Int32(i) => Value::from(*i),
        AnyValue::Int64(i) => Value::from(*i),
        AnyValue::UInt8(u) => Value::from(*u),
        AnyValue::UInt16(u) => Value::from(*u),
        AnyValue::UInt32(u) => Value::from(*u),
        AnyValue::UInt64(u) => Value::from(*u),
        AnyValue::Float32(f) => serde_json::Number::from_f64(*f as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AnyValue::Float64(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => Value::String(any_value_text(other)),
    }
}

fn first_non_null(df: &DataFrame, column: &str) -> Option<String> {
    let series = df.column(column).ok()?.drop_nulls();
    if series.is_empty() {
        return None;
    }
    let value = series.get(0).ok()?;
    let text = any_value_text(&value);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
