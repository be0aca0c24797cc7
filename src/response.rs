//! Response Synthesizer
//!
//! Turns the result table, intent and validation report into prose. Error
//! and empty states are answered from templates without calling the model.

use crate::agent_prompts;
use crate::catalog::describe::frame_rows;
use crate::catalog::profile::{numeric_summaries, NumericSummary};
use crate::error::Result;
use crate::intent::QueryIntent;
use crate::llm::{generate_with_deadline, Creativity, LanguageModel};
use crate::validation::ValidationReport;
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const NO_DATA_RESPONSE: &str =
    "I couldn't find any data matching your query. Please try rephrasing your question.";

pub fn error_response(error: &str) -> String {
    format!(
        "I encountered an issue: {}\n\nPlease rephrase your question or check if the data exists.",
        error
    )
}

/// Bounded view of a result table: counts, column names, a head sample and
/// numeric statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPreview {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    /// Head sample, one JSON object per row.
    pub rows: Vec<serde_json::Value>,
    pub numeric_summary: Vec<(String, NumericSummary)>,
}

impl ResultPreview {
    pub fn of(df: &DataFrame, max_rows: usize) -> Result<Self> {
        let head = df.head(Some(max_rows));
        Ok(Self {
            row_count: df.height(),
            column_count: df.width(),
            columns: df.get_column_names().iter().map(|s| s.to_string()).collect(),
            rows: frame_rows(&head)?,
            numeric_summary: numeric_summaries(df)?,
        })
    }

    /// `{columns, rows}` envelope used in serialized outcomes.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "columns": self.columns,
            "rows": self.rows,
        })
    }

    /// Plain-text rendering handed to the model.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total rows: {}", self.row_count);
        let _ = writeln!(out, "Columns: {}", self.columns.join(", "));

        let _ = writeln!(out, "\nFirst {} rows:", self.rows.len());
        for row in &self.rows {
            let cells = self
                .columns
                .iter()
                .map(|c| match row.get(c) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(serde_json::Value::Null) | None => "null".to_string(),
                    Some(other) => other.to_string(),
                })
                .join(" | ");
            let _ = writeln!(out, "{}", cells);
        }

        if !self.numeric_summary.is_empty() {
            out.push_str("\nSummary statistics:\n");
            for (column, s) in &self.numeric_summary {
                let _ = writeln!(
                    out,
                    "- {}: count={}, sum={:.2}, mean={}, min={}, max={}",
                    column,
                    s.count,
                    s.sum,
                    fmt_opt(s.mean),
                    fmt_opt(s.min),
                    fmt_opt(s.max)
                );
            }
        }
        out
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "n/a".to_string())
}

pub struct ResponseSynthesizer {
    model: Arc<dyn LanguageModel>,
    preview_rows: usize,
    deadline: Option<Duration>,
}

impl ResponseSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, preview_rows: usize, deadline: Option<Duration>) -> Self {
        Self {
            model,
            preview_rows,
            deadline,
        }
    }

    /// Always returns non-empty text.
    pub async fn respond(
        &self,
        question: &str,
        intent: &QueryIntent,
        result: &DataFrame,
        report: &ValidationReport,
        error: Option<&str>,
    ) -> String {
        if let Some(error) = error {
            return error_response(error);
        }
        if result.height() == 0 {
            return NO_DATA_RESPONSE.to_string();
        }

        let data_summary = match ResultPreview::of(result, self.preview_rows) {
            Ok(preview) => preview.render(),
            Err(e) => {
                error!("Failed to build result preview: {}", e);
                format!("Total rows: {}", result.height())
            }
        };
        let validation_json = serde_json::to_string_pretty(report).unwrap_or_default();
        let system = agent_prompts::response_system_prompt(question, intent, &data_summary, &validation_json);

        match generate_with_deadline(
            self.model.as_ref(),
            &system,
            agent_prompts::RESPONSE_USER_PROMPT,
            Creativity::High,
            self.deadline,
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => {
                info!("✅ Response generated");
                text.trim().to_string()
            }
            Ok(_) => "I have the data but encountered an error generating the response: empty response".to_string(),
            Err(e) => {
                error!("Response generation failed: {}", e);
                format!("I have the data but encountered an error generating the response: {}", e)
            }
        }
    }
}
