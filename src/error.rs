use std::fmt;
use thiserror::Error;

/// Failure reported by the query engine.
///
/// `Display` is the engine diagnostic verbatim. The repair loop pattern-matches
/// on this text, so it must never be prefixed or rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExecutionError {
    pub message: String,
}

impl QueryExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for QueryExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for QueryExecutionError {}

impl From<polars::error::PolarsError> for QueryExecutionError {
    fn from(err: polars::error::PolarsError) -> Self {
        QueryExecutionError::new(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Query execution error: {0}")]
    QueryExecution(#[from] QueryExecutionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for InsightError {
    fn from(err: polars::error::PolarsError) -> Self {
        InsightError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
