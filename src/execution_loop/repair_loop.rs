//! Query synthesis with one-shot repair
//!
//! ```text
//! SYNTHESIZED -> EXECUTED_OK
//! SYNTHESIZED -> EXECUTION_FAILED -> UNFIXABLE
//! SYNTHESIZED -> EXECUTION_FAILED -> REPAIR_ATTEMPTED -> REPAIRED_OK | REPAIR_FAILED
//! ```
//!
//! The model is asked for SQL at most twice per request. The repaired query
//! is executed once and its outcome is final.

use crate::agent_prompts;
use crate::catalog::QueryEngine;
use crate::config::RepairPolicy;
use crate::execution_loop::error_classifier::{ErrorClassifier, ErrorKind};
use crate::execution_loop::error_recovery::ErrorRecovery;
use crate::intent::QueryIntent;
use crate::llm::{generate_with_deadline, strip_code_fences, Creativity, LanguageModel};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    Synthesized,
    ExecutedOk,
    ExecutionFailed,
    RepairAttempted,
    RepairedOk,
    RepairFailed,
    Unfixable,
}

impl LoopState {
    pub fn is_success(self) -> bool {
        matches!(self, LoopState::ExecutedOk | LoopState::RepairedOk)
    }
}

/// What the loop produced for one request.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    /// Last query executed: the successful one, or the last that failed.
    pub sql: String,
    /// Result of the successful query; empty on failure.
    pub result: DataFrame,
    /// Human-readable failure summary.
    pub error: Option<String>,
    /// States visited, in order.
    pub trace: Vec<LoopState>,
    /// Model calls made for SQL (initial plus repair).
    pub synthesis_calls: u8,
    /// Classification of the first execution failure, if any.
    pub failure_kind: Option<ErrorKind>,
}

impl SynthesisOutcome {
    fn failed(sql: String, error: String, trace: Vec<LoopState>, synthesis_calls: u8, failure_kind: Option<ErrorKind>) -> Self {
        Self {
            sql,
            result: DataFrame::empty(),
            error: Some(error),
            trace,
            synthesis_calls,
            failure_kind,
        }
    }

    pub fn terminal_state(&self) -> Option<LoopState> {
        self.trace.last().copied()
    }
}

pub struct QuerySynthesizer {
    model: Arc<dyn LanguageModel>,
    classifier: ErrorClassifier,
    recovery: ErrorRecovery,
    policy: RepairPolicy,
    deadline: Option<Duration>,
}

impl QuerySynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, policy: RepairPolicy, deadline: Option<Duration>) -> Self {
        Self {
            model,
            classifier: ErrorClassifier::new(),
            recovery: ErrorRecovery::new(),
            policy,
            deadline,
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Repair when the failure is classified fixable, or always under
    /// [`RepairPolicy::Always`].
    fn should_repair(&self, kind: ErrorKind) -> bool {
        kind.is_fixable() || self.policy == RepairPolicy::Always
    }

    pub async fn run(&self, question: &str, intent: &QueryIntent, engine: &dyn QueryEngine) -> SynthesisOutcome {
        let tables = engine.tables();
        if tables.is_empty() {
            warn!("No tables loaded, skipping SQL generation");
            return SynthesisOutcome::failed(
                String::new(),
                "No tables are available to query, so there is no matching data.".to_string(),
                Vec::new(),
                0,
                None,
            );
        }
        let schema = engine.schema_description();

        // SYNTHESIZED
        let system = agent_prompts::synthesis_system_prompt(&schema, &tables, intent);
        let user = agent_prompts::synthesis_user_prompt(question);
        let sql = match self.ask_for_sql(&system, &user).await {
            Ok(sql) => sql,
            Err(e) => {
                error!("SQL generation failed: {}", e);
                return SynthesisOutcome::failed(String::new(), format!("Query generation failed: {}", e), Vec::new(), 1, None);
            }
        };
        let mut trace = vec![LoopState::Synthesized];
        info!("✅ Generated SQL: {}", preview(&sql));

        let failure = match engine.execute(&sql) {
            Ok(df) => {
                info!("✅ Extracted {} rows", df.height());
                trace.push(LoopState::ExecutedOk);
                return SynthesisOutcome {
                    sql,
                    result: df,
                    error: None,
                    trace,
                    synthesis_calls: 1,
                    failure_kind: None,
                };
            }
            Err(e) => e,
        };

        // EXECUTION_FAILED
        trace.push(LoopState::ExecutionFailed);
        let kind = self.classifier.classify(&failure.message);
        error!("SQL execution error ({}): {}", kind, failure.message);

        if !self.should_repair(kind) {
            trace.push(LoopState::Unfixable);
            return SynthesisOutcome::failed(
                sql,
                format!("Query execution failed (no fix attempted): {}", failure.message),
                trace,
                1,
                Some(kind),
            );
        }

        // REPAIR_ATTEMPTED
        trace.push(LoopState::RepairAttempted);
        info!("Attempting to fix SQL query ({})...", kind);
        let guidance = self.recovery.guidance(kind, &failure.message, &sql, &tables);
        let repair_system = agent_prompts::repair_system_prompt(&sql, &failure.message, &schema, &tables, &guidance);

        let fixed_sql = match self.ask_for_sql(&repair_system, agent_prompts::REPAIR_USER_PROMPT).await {
            Ok(fixed) => fixed,
            Err(e) => {
                error!("Repair generation failed: {}", e);
                trace.push(LoopState::RepairFailed);
                return SynthesisOutcome::failed(
                    sql,
                    format!("Query execution failed even after fix attempt: {}", e),
                    trace,
                    2,
                    Some(kind),
                );
            }
        };

        info!("Retrying with fixed SQL: {}", preview(&fixed_sql));
        match engine.execute(&fixed_sql) {
            Ok(df) => {
                info!("✅ Query fixed! Extracted {} rows", df.height());
                trace.push(LoopState::RepairedOk);
                SynthesisOutcome {
                    sql: fixed_sql,
                    result: df,
                    error: None,
                    trace,
                    synthesis_calls: 2,
                    failure_kind: Some(kind),
                }
            }
            Err(retry_error) => {
                error!("Retry failed: {}", retry_error);
                trace.push(LoopState::RepairFailed);
                SynthesisOutcome::failed(
                    fixed_sql,
                    format!("Query execution failed even after fix attempt: {}", retry_error.message),
                    trace,
                    2,
                    Some(kind),
                )
            }
        }
    }

    async fn ask_for_sql(&self, system: &str, user: &str) -> crate::error::Result<String> {
        let raw = generate_with_deadline(self.model.as_ref(), system, user, Creativity::Low, self.deadline).await?;
        Ok(strip_code_fences(&raw))
    }
}

fn preview(sql: &str) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 100 {
        format!("{}...", flat.chars().take(100).collect::<String>())
    } else {
        flat
    }
}
