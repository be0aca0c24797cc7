use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polars::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabular_insights::catalog::describe::format_count;
use tabular_insights::{
    CatalogSettings, LlmClient, LlmSettings, Pipeline, PipelineSettings, QueryMode, QueryOutcome, RepairPolicy,
    SchemaCatalog, SummaryPreset,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "insights")]
#[command(about = "Ask questions about CSV data in plain language")]
struct Args {
    /// Directory holding the CSV sources
    #[arg(short, long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Chat model (or set OPENAI_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Chat-completions base URL (or set OPENAI_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Also attempt a repair for errors outside the known vocabulary
    #[arg(long, global = true)]
    repair_unclassified: bool,

    /// Deadline for each model call, in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question
    Ask {
        question: String,
        #[arg(long, default_value = "qa")]
        mode: QueryMode,
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
        /// Write the result table to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Run a canned summarization
    Summarize {
        #[arg(long, default_value = "overall")]
        kind: SummaryPreset,
        #[arg(long)]
        json: bool,
    },
    /// List loaded tables
    Tables,
    /// Print the schema description handed to the model
    Schema,
    /// Show statistics and sample rows of one table
    Explore {
        table: String,
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// Find columns whose name contains a keyword
    Search { keyword: String },
    /// Quick totals for amount and quantity columns
    Insights,
    /// Ask questions line by line from stdin
    Chat {
        #[arg(long, default_value = "qa")]
        mode: QueryMode,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("Loading data from {}", args.data_dir.display());
    let catalog = SchemaCatalog::load_dir(&args.data_dir, CatalogSettings::default())
        .with_context(|| format!("failed to load data directory {}", args.data_dir.display()))?;
    info!("Loaded {} tables", catalog.tables().len());

    match &args.command {
        Command::Tables => {
            for table in catalog.table_records() {
                println!(
                    "{:<40} {:>12} rows  {:>4} columns  ({})",
                    table.name,
                    format_count(table.row_count),
                    table.columns.len(),
                    table.origin
                );
            }
        }
        Command::Schema => println!("{}", catalog.schema_description()),
        Command::Explore { table, rows } => {
            let summary = catalog
                .summary_statistics(table)?
                .with_context(|| format!("unknown table '{}'", table))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            println!("{}", catalog.sample_rows(table, *rows));
        }
        Command::Search { keyword } => {
            let found = catalog.search_columns(keyword);
            if found.is_empty() {
                println!("No columns match '{}'", keyword);
            }
            for (table, columns) in found {
                println!("{}: {}", table, columns.join(", "));
            }
        }
        Command::Insights => {
            for (table, lines) in catalog.generate_insights()? {
                println!("== {} ==", table);
                for line in lines {
                    println!("  {}", line);
                }
            }
        }
        Command::Ask {
            question,
            mode,
            json,
            export,
        } => {
            let pipeline = build_pipeline(&args, catalog)?;
            let outcome = pipeline.process_query(question, *mode).await;
            print_outcome(&outcome, *json)?;
            if let Some(path) = export {
                export_csv(&outcome, path)?;
            }
        }
        Command::Summarize { kind, json } => {
            let pipeline = build_pipeline(&args, catalog)?;
            let outcome = pipeline.summarize(*kind).await;
            print_outcome(&outcome, *json)?;
        }
        Command::Chat { mode } => {
            let pipeline = build_pipeline(&args, catalog)?;
            let mut stdout = tokio::io::stdout();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;
                let line = match lines.next_line().await? {
                    Some(line) => line,
                    None => break,
                };
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if matches!(question, "exit" | "quit") {
                    break;
                }
                let outcome = pipeline.process_query(question, *mode).await;
                print_outcome(&outcome, false)?;
            }
        }
    }

    Ok(())
}

fn build_pipeline(args: &Args, catalog: SchemaCatalog) -> Result<Pipeline> {
    let llm_settings = LlmSettings::from_env(args.api_key.clone())?
        .with_model(args.model.clone())
        .with_base_url(args.base_url.clone());
    info!("Using model {}", llm_settings.model);

    let mut settings = PipelineSettings::from_env();
    if args.repair_unclassified {
        settings.repair_policy = RepairPolicy::Always;
    }
    if let Some(secs) = args.timeout_secs {
        settings.model_timeout = Some(Duration::from_secs(secs));
    }

    let model = Arc::new(LlmClient::from_settings(&llm_settings));
    Ok(Pipeline::new(Arc::new(catalog), model, settings))
}

fn print_outcome(outcome: &QueryOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!("\n{}\n", outcome.response);
    if !outcome.sql_text.is_empty() {
        println!("SQL:\n{}\n", outcome.sql_text);
    }
    if outcome.result_table.height() > 0 {
        println!("{}", outcome.result_table.head(Some(10)));
    }
    for warning in &outcome.validation_report.warnings {
        println!("⚠️  {}", warning);
    }
    Ok(())
}

fn export_csv(outcome: &QueryOutcome, path: &PathBuf) -> Result<()> {
    let mut df = outcome.result_table.clone();
    let mut file = std::fs::File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    info!("Exported {} rows to {}", df.height(), path.display());
    Ok(())
}
