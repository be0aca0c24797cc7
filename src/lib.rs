//! Natural-language analytics over tabular data.
//!
//! A question flows through intent extraction, SQL synthesis with a single
//! repair attempt, result validation and response synthesis. The schema
//! catalog grounds every model call and executes the generated SQL.

pub mod agent_prompts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod execution_loop;
pub mod intent;
pub mod llm;
pub mod pipeline;
pub mod response;
pub mod validation;

pub use catalog::{QueryEngine, SchemaCatalog, TableSource};
pub use config::{CatalogSettings, LlmSettings, PipelineSettings, RepairPolicy};
pub use error::{InsightError, QueryExecutionError, Result};
pub use execution_loop::{ErrorClassifier, ErrorKind, LoopState, QuerySynthesizer};
pub use intent::{QueryIntent, QueryMode};
pub use llm::{Creativity, LanguageModel, LlmClient};
pub use pipeline::{Pipeline, QueryOutcome, RequestState, SummaryPreset};
pub use validation::{ResultValidator, ValidationReport};
