//! Intent Extractor
//!
//! Turns a free-text question into a typed [`QueryIntent`]. Model output is
//! unreliable, so every field has a default and unparseable output falls
//! back to a minimal intent instead of failing the request.

use crate::agent_prompts;
use crate::llm::{generate_with_deadline, strip_code_fences, Creativity, LanguageModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Summarization,
    #[default]
    Qa,
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryMode::Summarization => write!(f, "summarization"),
            QueryMode::Qa => write!(f, "qa"),
        }
    }
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "summarization" | "summary" | "summarize" => Ok(QueryMode::Summarization),
            "qa" | "q&a" | "question" => Ok(QueryMode::Qa),
            other => Err(format!("unknown mode '{}', expected 'summarization' or 'qa'", other)),
        }
    }
}

/// Structured interpretation of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub description: String,
    pub mode: QueryMode,
    pub tables_needed: Vec<String>,
    pub columns_needed: Vec<String>,
    pub filters: Vec<String>,
    pub aggregations: Vec<String>,
    pub time_period: Option<String>,
    pub comparison: Option<String>,
}

impl QueryIntent {
    /// Minimal intent used when the model output cannot be parsed.
    pub fn fallback(description: impl Into<String>, mode: QueryMode) -> Self {
        Self {
            description: description.into(),
            mode,
            tables_needed: Vec::new(),
            columns_needed: Vec::new(),
            filters: Vec::new(),
            aggregations: Vec::new(),
            time_period: None,
            comparison: None,
        }
    }

    /// Parse model output, tolerating code fences, surrounding prose and
    /// loosely typed fields. `None` when no JSON object can be found.
    pub fn parse(raw: &str, question: &str, known_mode: QueryMode) -> Option<Self> {
        let cleaned = strip_code_fences(raw);
        let object = extract_json_object(&cleaned)?;
        let parsed: RawIntent = serde_json::from_str(object).ok()?;

        let mode = parsed
            .mode
            .as_ref()
            .and_then(value_text)
            .and_then(|m| m.parse::<QueryMode>().ok())
            .unwrap_or(known_mode);

        Some(Self {
            description: parsed
                .description
                .as_ref()
                .and_then(value_text)
                .unwrap_or_else(|| question.to_string()),
            mode,
            tables_needed: value_list(parsed.tables_needed),
            columns_needed: value_list(parsed.columns_needed),
            filters: value_list(parsed.filters),
            aggregations: value_list(parsed.aggregations),
            time_period: parsed.time_period.as_ref().and_then(value_text),
            comparison: parsed.comparison.as_ref().and_then(value_text),
        })
    }
}

/// Wire shape of the model's answer; every field optional and untyped.
#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default, alias = "intent")]
    description: Option<Value>,
    #[serde(default)]
    mode: Option<Value>,
    #[serde(default)]
    tables_needed: Option<Value>,
    #[serde(default)]
    columns_needed: Option<Value>,
    #[serde(default)]
    filters: Option<Value>,
    #[serde(default)]
    aggregations: Option<Value>,
    #[serde(default)]
    time_period: Option<Value>,
    #[serde(default)]
    comparison: Option<Value>,
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Scalar or object rendered as text; null and empty strings are `None`.
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// A list, a single value, or an object of named entries, flattened to text.
fn value_list(value: Option<Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| value_text(v).map(|v| format!("{}: {}", k, v)))
            .collect(),
        Some(other) => value_text(&other).into_iter().collect(),
    }
}

pub struct IntentExtractor {
    model: Arc<dyn LanguageModel>,
    deadline: Option<Duration>,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, deadline: Option<Duration>) -> Self {
        Self { model, deadline }
    }

    /// One model call, no retries. Never fails: any problem yields a
    /// fallback intent in `known_mode`.
    pub async fn extract(&self, question: &str, known_mode: QueryMode, schema: &str) -> QueryIntent {
        let system = agent_prompts::intent_system_prompt(schema);
        let user = agent_prompts::intent_user_prompt(question);

        let raw = match generate_with_deadline(self.model.as_ref(), &system, &user, Creativity::Low, self.deadline).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Intent extraction call failed, using fallback intent: {}", e);
                return QueryIntent::fallback(question, known_mode);
            }
        };

        match QueryIntent::parse(&raw, question, known_mode) {
            Some(intent) => {
                info!("✅ Intent identified: {}", intent.description);
                intent
            }
            None => {
                warn!("Intent output was not structured JSON, using fallback intent");
                QueryIntent::fallback(raw.trim(), known_mode)
            }
        }
    }
}
