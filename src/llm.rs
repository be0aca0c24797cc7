use crate::config::LlmSettings;
use crate::error::{InsightError, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

lazy_static! {
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?s)```(?:[A-Za-z0-9_-]*[ \t]*\r?\n)?(.*?)```").unwrap();
}

/// Sampling configuration for a model call.
///
/// Structured outputs other stages depend on use `Low`; only prose uses `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Creativity {
    Low,
    High,
}

impl Creativity {
    pub fn temperature(self) -> f64 {
        match self {
            Creativity::Low => 0.0,
            Creativity::High => 0.7,
        }
    }
}

/// The language-model capability: system instructions plus user content in,
/// text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, system: &str, user: &str, creativity: Creativity) -> Result<String>;
}

/// Call `model`, failing with [`InsightError::Timeout`] past `deadline`.
pub async fn generate_with_deadline(
    model: &dyn LanguageModel,
    system: &str,
    user: &str,
    creativity: Creativity,
    deadline: Option<Duration>,
) -> Result<String> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, model.generate(system, user, creativity))
            .await
            .map_err(|_| InsightError::Timeout(limit))?,
        None => model.generate(system, user, creativity).await,
    }
}

/// Strip a markdown code fence (and its language tag) from model output.
///
/// Plain text is returned trimmed. When the output holds several fenced
/// blocks, the first one wins.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(captures) = FENCED_BLOCK.captures(trimmed) {
        if let Some(body) = captures.get(1) {
            return body.as_str().trim().to_string();
        }
    }
    // Unterminated fence: drop the opening line only.
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        return body.trim().to_string();
    }
    trimmed.to_string()
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(
            settings.api_key.clone(),
            settings.model.clone(),
            settings.base_url.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, system: &str, user: &str, creativity: Creativity) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": creativity.temperature(),
        });

        // Reasoning models spend completion tokens on reasoning.
        if self.model.starts_with("gpt-5") || self.model.contains("o1") {
            body["max_completion_tokens"] = serde_json::json!(4000);
        } else {
            body["max_tokens"] = serde_json::json!(2000);
        }
        body
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn generate(&self, system: &str, user: &str, creativity: Creativity) -> Result<String> {
        let body = self.request_body(system, user, creativity);
        debug!("LLM request: model={}, temperature={}", self.model, creativity.temperature());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InsightError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(InsightError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InsightError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(InsightError::Llm(format!("LLM API error: {}", error)));
        }

        let choice = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .ok_or_else(|| InsightError::Llm(format!("No choices in LLM response: {}", response_json)))?;

        match choice.get("finish_reason").and_then(|r| r.as_str()) {
            Some("length") => warn!("LLM response was truncated due to length limit"),
            Some("content_filter") => {
                return Err(InsightError::Llm("LLM response was filtered by content policy".to_string()))
            }
            _ => {}
        }

        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| InsightError::Llm(format!("No content in LLM response: {}", response_json)))?;

        if content.trim().is_empty() {
            return Err(InsightError::Llm("Empty content in LLM response".to_string()));
        }

        Ok(content.to_string())
    }
}
