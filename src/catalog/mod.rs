//! Schema Catalog
//!
//! Loads tabular sources into normalized in-memory frames, keeps the
//! metadata the model is grounded on, and executes SQL against the frames.
//! Built once at startup and read-only afterwards.

pub mod describe;
pub mod normalize;
pub mod profile;
pub mod sanitize;
pub mod typecheck;

use crate::config::CatalogSettings;
use crate::error::{InsightError, QueryExecutionError, Result};
use polars::prelude::*;
use polars::sql::SQLContext;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub use profile::{NumericSummary, TableSummary};
pub use sanitize::sanitize_name;

/// Execution surface the query synthesizer runs against.
///
/// Implementations must be usable from several requests at once; the
/// catalog does this by giving every `execute` call its own SQL context.
pub trait QueryEngine: Send + Sync {
    /// Valid table names, in load order.
    fn tables(&self) -> Vec<String>;

    /// Grounding text for SQL generation.
    fn schema_description(&self) -> String;

    /// Run `sql`. Errors carry the engine diagnostic verbatim.
    fn execute(&self, sql: &str) -> std::result::Result<DataFrame, QueryExecutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub dtype: String,
}

/// Metadata for one loaded source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub origin: String,
    pub columns: Vec<Column>,
    pub row_count: usize,
}

/// A raw tabular source handed to [`SchemaCatalog::load`].
#[derive(Debug, Clone)]
pub enum TableSource {
    Csv(PathBuf),
    Frame { origin: String, frame: DataFrame },
}

impl TableSource {
    /// Source identifier shown to the model, e.g. the original file name.
    pub fn origin(&self) -> String {
        match self {
            TableSource::Csv(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            TableSource::Frame { origin, .. } => origin.clone(),
        }
    }

    /// The part of the origin a table name is derived from.
    fn stem(&self) -> String {
        let origin = self.origin();
        Path::new(&origin)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or(origin)
    }

    fn read(self) -> Result<DataFrame> {
        match self {
            TableSource::Csv(path) => {
                let df = LazyCsvReader::new(&path)
                    .with_has_header(true)
                    .with_infer_schema_length(None)
                    .finish()
                    .map_err(|e| InsightError::Ingestion(format!("Failed to read CSV {}: {}", path.display(), e)))?
                    .collect()
                    .map_err(|e| InsightError::Ingestion(format!("Failed to collect CSV {}: {}", path.display(), e)))?;
                Ok(df)
            }
            TableSource::Frame { frame, .. } => Ok(frame),
        }
    }
}

/// Normalized, queryable collection of every loaded table.
pub struct SchemaCatalog {
    tables: Vec<Table>,
    frames: HashMap<String, DataFrame>,
    settings: CatalogSettings,
}

impl SchemaCatalog {
    /// Load every source, skipping (and logging) the ones that fail.
    pub fn load(sources: Vec<TableSource>, settings: CatalogSettings) -> Self {
        let mut catalog = Self {
            tables: Vec::new(),
            frames: HashMap::new(),
            settings,
        };

        for source in sources {
            let origin = source.origin();
            info!("Loading {}...", origin);
            match catalog.register(source) {
                Ok(table) => info!(
                    "✅ Loaded {}: {} rows, {} columns",
                    table.name,
                    table.row_count,
                    table.columns.len()
                ),
                Err(e) => error!("Error loading {}: {}", origin, e),
            }
        }

        catalog
    }

    /// Load every `*.csv` file in `dir`, in file-name order.
    ///
    /// A missing or unreadable directory is fatal; bad files are not.
    pub fn load_dir(dir: impl AsRef<Path>, settings: CatalogSettings) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            InsightError::Catalog(format!("Cannot read data directory {}: {}", dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|ext| ext.eq_ignore_ascii_case("csv"))
                        .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            warn!("No CSV files found in {}", dir.display());
        }

        Ok(Self::load(
            paths.into_iter().map(TableSource::Csv).collect(),
            settings,
        ))
    }

    fn register(&mut self, source: TableSource) -> Result<Table> {
        let origin = source.origin();
        let taken: HashSet<String> = self.frames.keys().cloned().collect();
        let name = sanitize::unique_name(&sanitize_name(&source.stem()), &taken);

        let df = normalize::normalize_frame(source.read()?, &self.settings)?;

        let table = Table {
            name: name.clone(),
            origin,
            columns: df
                .get_columns()
                .iter()
                .map(|s| Column {
                    name: s.name().to_string(),
                    dtype: s.dtype().to_string(),
                })
                .collect(),
            row_count: df.height(),
        };

        self.frames.insert(name, df);
        self.tables.push(table.clone());
        Ok(table)
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    pub fn tables(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn table_records(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn frame(&self, name: &str) -> Option<&DataFrame> {
        self.frames.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// First `n` rows of a table; an empty frame for unknown tables.
    pub fn sample_rows(&self, name: &str, n: usize) -> DataFrame {
        self.frames
            .get(name)
            .map(|df| df.head(Some(n)))
            .unwrap_or_else(DataFrame::empty)
    }

    pub fn schema_description(&self) -> String {
        describe::render(self)
    }

    /// Run a query over the loaded tables.
    ///
    /// Every call registers the shared frames in a fresh SQL context, so
    /// concurrent callers never share a mutable handle. Numeric aggregates
    /// over text columns are rejected before execution.
    pub fn execute(&self, sql: &str) -> std::result::Result<DataFrame, QueryExecutionError> {
        if let Err(e) = typecheck::check_numeric_aggregates(self, sql) {
            warn!("Rejected query: {}", e);
            return Err(e);
        }
        let mut ctx = SQLContext::new();
        for table in &self.tables {
            if let Some(df) = self.frames.get(&table.name) {
                ctx.register(&table.name, df.clone().lazy());
            }
        }
        let df = ctx.execute(sql)?.collect()?;
        Ok(df)
    }
}

impl QueryEngine for SchemaCatalog {
    fn tables(&self) -> Vec<String> {
        SchemaCatalog::tables(self)
    }

    fn schema_description(&self) -> String {
        SchemaCatalog::schema_description(self)
    }

    fn execute(&self, sql: &str) -> std::result::Result<DataFrame, QueryExecutionError> {
        SchemaCatalog::execute(self, sql)
    }
}
