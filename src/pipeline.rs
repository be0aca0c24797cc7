//! Orchestrator
//!
//! Runs intent extraction, query synthesis, validation and response
//! synthesis strictly in order over one [`RequestState`] per request. Stages
//! take the state by value and hand it back, so only one stage holds it at a
//! time. Failures are recorded on the state and never abort the pipeline:
//! the response stage always runs and turns errors into the answer text.

use crate::catalog::QueryEngine;
use crate::config::PipelineSettings;
use crate::execution_loop::{LoopState, QuerySynthesizer};
use crate::intent::{IntentExtractor, QueryIntent, QueryMode};
use crate::llm::LanguageModel;
use crate::response::{ResponseSynthesizer, ResultPreview};
use crate::validation::{ResultValidator, ValidationReport};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// The unit of work for one `process_query` call.
#[derive(Debug, Clone)]
pub struct RequestState {
    pub request_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub user_query: String,
    pub mode: QueryMode,
    pub intent: Option<QueryIntent>,
    pub sql_text: String,
    pub result_table: DataFrame,
    pub validation_report: Option<ValidationReport>,
    pub final_response: String,
    pub error: Option<String>,
    pub repair_trace: Vec<LoopState>,
}

impl RequestState {
    pub fn new(user_query: &str, mode: QueryMode) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            user_query: user_query.to_string(),
            mode,
            intent: None,
            sql_text: String::new(),
            result_table: DataFrame::empty(),
            validation_report: None,
            final_response: String::new(),
            error: None,
            repair_trace: Vec::new(),
        }
    }
}

/// What the caller gets back from [`Pipeline::process_query`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub request_id: Uuid,
    pub response: String,
    pub sql_text: String,
    #[serde(skip)]
    pub result_table: DataFrame,
    /// `{columns, rows}` head of the result table.
    pub result_preview: serde_json::Value,
    pub intent: QueryIntent,
    pub validation_report: ValidationReport,
    pub error: Option<String>,
    pub repair_trace: Vec<LoopState>,
    pub elapsed_ms: i64,
}

/// Canned summarization requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SummaryPreset {
    Overall,
    ByCategory,
    ByTimePeriod,
    TopPerformers,
    Custom,
}

impl SummaryPreset {
    pub fn question(self) -> &'static str {
        match self {
            SummaryPreset::Overall => "Provide a comprehensive summary of overall sales performance including total revenue, number of transactions, top categories, and key trends.",
            SummaryPreset::ByCategory => "Summarize sales performance broken down by product categories, showing which categories perform best.",
            SummaryPreset::ByTimePeriod => "Analyze sales trends over time, showing monthly or quarterly patterns and growth rates.",
            SummaryPreset::TopPerformers => "Identify top performing products, customers, and categories by sales volume and revenue.",
            SummaryPreset::Custom => "Provide a detailed analytical summary of all key metrics in the sales data.",
        }
    }
}

impl fmt::Display for SummaryPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SummaryPreset::Overall => "overall",
            SummaryPreset::ByCategory => "by-category",
            SummaryPreset::ByTimePeriod => "by-time-period",
            SummaryPreset::TopPerformers => "top-performers",
            SummaryPreset::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for SummaryPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "overall" => Ok(SummaryPreset::Overall),
            "by-category" | "category" => Ok(SummaryPreset::ByCategory),
            "by-time-period" | "time" | "time-period" => Ok(SummaryPreset::ByTimePeriod),
            "top-performers" | "top" => Ok(SummaryPreset::TopPerformers),
            "custom" => Ok(SummaryPreset::Custom),
            other => Err(format!("unknown summary kind '{}'", other)),
        }
    }
}

pub struct Pipeline {
    engine: Arc<dyn QueryEngine>,
    intent_extractor: IntentExtractor,
    synthesizer: QuerySynthesizer,
    validator: ResultValidator,
    responder: ResponseSynthesizer,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(engine: Arc<dyn QueryEngine>, model: Arc<dyn LanguageModel>, settings: PipelineSettings) -> Self {
        let deadline = settings.model_timeout;
        Self {
            engine,
            intent_extractor: IntentExtractor::new(model.clone(), deadline),
            synthesizer: QuerySynthesizer::new(model.clone(), settings.repair_policy, deadline),
            validator: ResultValidator::new(settings.large_result_threshold, settings.null_warning_percentage),
            responder: ResponseSynthesizer::new(model, settings.preview_rows, deadline),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    /// Answer one question. Always returns a well-formed outcome.
    pub async fn process_query(&self, question: &str, mode: QueryMode) -> QueryOutcome {
        let state = RequestState::new(question, mode);
        let span = info_span!("process_query", request_id = %state.request_id);

        async move {
            info!("Processing {} query: {}", state.mode, state.user_query);
            let state = self.extract_intent(state).await;
            let state = self.synthesize_query(state).await;
            let state = self.validate(state);
            let state = self.respond(state).await;
            self.finish(state)
        }
        .instrument(span)
        .await
    }

    /// Run a canned summarization request.
    pub async fn summarize(&self, preset: SummaryPreset) -> QueryOutcome {
        self.process_query(preset.question(), QueryMode::Summarization).await
    }

    async fn extract_intent(&self, mut state: RequestState) -> RequestState {
        let schema = self.engine.schema_description();
        let intent = self
            .intent_extractor
            .extract(&state.user_query, state.mode, &schema)
            .await;
        if intent.mode != state.mode {
            info!("Mode updated from {} to {}", state.mode, intent.mode);
            state.mode = intent.mode;
        }
        state.intent = Some(intent);
        state
    }

    async fn synthesize_query(&self, mut state: RequestState) -> RequestState {
        let intent = state
            .intent
            .clone()
            .unwrap_or_else(|| QueryIntent::fallback(state.user_query.clone(), state.mode));
        let outcome = self
            .synthesizer
            .run(&state.user_query, &intent, self.engine.as_ref())
            .await;

        state.sql_text = outcome.sql;
        state.result_table = outcome.result;
        state.repair_trace = outcome.trace;
        if let Some(error) = outcome.error {
            state.error = Some(error);
        }
        state
    }

    fn validate(&self, mut state: RequestState) -> RequestState {
        let report = self.validator.validate(&state.result_table);
        if report.is_valid {
            info!(
                "✅ Validation: {} rows, {} columns, {} warnings",
                report.row_count,
                report.column_count,
                report.warnings.len()
            );
        } else {
            warn!("Validation failed: {}", report.warnings.join("; "));
        }
        state.validation_report = Some(report);
        state
    }

    async fn respond(&self, mut state: RequestState) -> RequestState {
        let intent = state
            .intent
            .clone()
            .unwrap_or_else(|| QueryIntent::fallback(state.user_query.clone(), state.mode));
        let report = state
            .validation_report
            .clone()
            .unwrap_or_else(|| self.validator.validate(&state.result_table));

        state.final_response = self
            .responder
            .respond(
                &state.user_query,
                &intent,
                &state.result_table,
                &report,
                state.error.as_deref(),
            )
            .await;
        state
    }

    fn finish(&self, state: RequestState) -> QueryOutcome {
        let elapsed_ms = (Utc::now() - state.started_at).num_milliseconds();
        let result_preview = ResultPreview::of(&state.result_table, self.settings.preview_rows)
            .map(|p| p.to_json())
            .unwrap_or_else(|_| serde_json::json!({"columns": [], "rows": []}));
        info!("Request finished in {} ms", elapsed_ms);

        let validation_report = match state.validation_report {
            Some(report) => report,
            None => self.validator.validate(&state.result_table),
        };

        QueryOutcome {
            request_id: state.request_id,
            response: state.final_response,
            sql_text: state.sql_text,
            result_table: state.result_table,
            result_preview,
            intent: state
                .intent
                .unwrap_or_else(|| QueryIntent::fallback(state.user_query, state.mode)),
            validation_report,
            error: state.error,
            repair_trace: state.repair_trace,
            elapsed_ms,
        }
    }
}
