//! Runtime configuration
//!
//! LLM connection settings come from the environment (optionally a `.env`
//! file loaded by the binary); pipeline knobs have defaults and can be
//! overridden from the command line.

use crate::error::{InsightError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl LlmSettings {
    /// Read `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    ///
    /// An explicit `api_key` wins over the environment.
    pub fn from_env(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                InsightError::Llm("No API key: pass --api-key or set OPENAI_API_KEY".to_string())
            })?;

        Ok(Self {
            api_key,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        self
    }
}

/// Which execution failures earn the single repair attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepairPolicy {
    /// Only failures matching the fixable vocabulary are repaired.
    #[default]
    FixableOnly,
    /// Every failure gets one repair attempt, classified or not.
    Always,
}

/// Knobs for the request pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub repair_policy: RepairPolicy,
    /// Deadline for each language-model call. `None` waits forever.
    pub model_timeout: Option<Duration>,
    /// Rows of the result handed to the response synthesizer.
    pub preview_rows: usize,
    pub large_result_threshold: usize,
    pub null_warning_percentage: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            repair_policy: RepairPolicy::FixableOnly,
            model_timeout: None,
            preview_rows: 10,
            large_result_threshold: 10_000,
            null_warning_percentage: 50.0,
        }
    }
}

impl PipelineSettings {
    /// Defaults plus `INSIGHTS_LLM_TIMEOUT_SECS` when set to a positive integer.
    pub fn from_env() -> Self {
        let model_timeout = std::env::var("INSIGHTS_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            model_timeout,
            ..Self::default()
        }
    }
}

/// Catalog ingestion knobs.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Rows shown per table in the schema description.
    pub sample_rows_in_schema: usize,
    /// Non-null values inspected when deciding whether a text column is numeric.
    pub numeric_sample_size: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            sample_rows_in_schema: 2,
            numeric_sample_size: 100,
        }
    }
}
