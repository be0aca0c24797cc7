//! Agent Prompts - instructions handed to the language model at each stage
//!
//! Wording is free to change. What each prompt must carry is fixed: the
//! schema description for grounding, the generation rules for SQL, and on
//! repair the failed query plus the verbatim engine error.

use crate::intent::QueryIntent;
use itertools::Itertools;

/// Rules every generated query must follow. Violations are the dominant
/// failure mode, so they are repeated in both synthesis and repair prompts.
pub const SQL_GENERATION_RULES: &str = r#"CRITICAL Rules:
1. ONLY use table names from the AVAILABLE TABLES list. Never invent table names.
2. Use exact column names as shown in the schema.
3. Prefer a single SELECT (with GROUP BY / ORDER BY / JOIN / UNION ALL as needed).
   Avoid WITH clauses and nested sub-queries unless there is no single-SELECT form;
   composed sub-queries frequently fail with "not found" errors.
4. Text columns holding numbers must be cast before numeric aggregation:
   SUM(CAST(amount AS DOUBLE)) instead of SUM(amount).
5. Date columns are stored as text and may contain non-date text (header rows such
   as "SKU"). There are NO date-parsing functions: STRPTIME, TO_DATE, STRFTIME and
   DATE_TRUNC do not exist. Keep rows starting with a digit first, e.g.
   WHERE REGEXP_LIKE(date_col, '^[0-9]'), then take date parts with SUBSTR using
   the example value in the schema, e.g. SUBSTR(date_col, 1, 2) for the month of
   '04-30-22' or SUBSTR(date_col, 1, 7) for the year-month of '2022-04-30'.
6. Concatenate strings per group with ARRAY_TO_STRING(ARRAY_AGG(col), ', ').
   STRING_AGG, GROUP_CONCAT, LISTAGG and LIST_AGGR do not exist.
7. Apply the filters and aggregations from the intent; add LIMIT for large lists.
8. Return ONLY the SQL query, nothing else."#;

pub fn intent_system_prompt(schema: &str) -> String {
    format!(
        r#"You are a Query Understanding Agent for a tabular analytics assistant.

Available data schema:
{schema}

Your task:
1. Understand the user's natural-language question.
2. Identify what the user wants (summary, comparison, trend, specific metric, ...).
3. Map it to the relevant tables and columns from the schema above.
4. Identify filters, aggregations and time periods.
5. Decide whether this is a "summarization" or a "qa" request.

Return ONLY a JSON object with these keys:
- "description": brief description of what the user wants
- "mode": "summarization" or "qa"
- "tables_needed": list of table names
- "columns_needed": list of column names
- "filters": list of conditions
- "aggregations": list of sum/avg/count operations
- "time_period": date/time restriction or null
- "comparison": requested comparison (YoY, regions, categories, ...) or null"#
    )
}

pub fn intent_user_prompt(question: &str) -> String {
    format!("User query: {}", question)
}

fn backticked(tables: &[String]) -> String {
    tables.iter().map(|t| format!("`{}`", t)).join(", ")
}

pub fn synthesis_system_prompt(schema: &str, tables: &[String], intent: &QueryIntent) -> String {
    let intent_json = serde_json::to_string_pretty(intent).unwrap_or_else(|_| intent.description.clone());
    format!(
        r#"You are a Data Extraction Agent that writes SQL queries.

{schema}

**AVAILABLE TABLES**: {tables}

Based on the query intent below, write one valid SQL query that extracts the needed data.

Query Intent:
{intent_json}

{rules}

Remember: simple queries are better. Most questions are answered by a single
SELECT + GROUP BY + ORDER BY."#,
        schema = schema,
        tables = backticked(tables),
        intent_json = intent_json,
        rules = SQL_GENERATION_RULES,
    )
}

pub fn synthesis_user_prompt(question: &str) -> String {
    format!("Generate SQL for: {}", question)
}

/// Repair prompt: failed query, verbatim error, schema, and remediation
/// guidance chosen by the caller for the classified failure.
pub fn repair_system_prompt(
    failed_sql: &str,
    error_message: &str,
    schema: &str,
    tables: &[String],
    guidance: &[String],
) -> String {
    let numbered = guidance
        .iter()
        .enumerate()
        .map(|(i, g)| format!("{}. {}", i + 1, g))
        .join("\n");

    format!(
        r#"The SQL query failed with an error:
{error_message}

Original query:
{failed_sql}

Available tables: {tables}

Full schema with all columns:
{schema}

Fix this query:
{numbered}

{rules}"#,
        error_message = error_message,
        failed_sql = failed_sql,
        tables = backticked(tables),
        schema = schema,
        numbered = numbered,
        rules = SQL_GENERATION_RULES,
    )
}

pub const REPAIR_USER_PROMPT: &str = "Return ONLY the fixed SQL query, nothing else.";

pub fn response_system_prompt(
    question: &str,
    intent: &QueryIntent,
    data_summary: &str,
    validation_json: &str,
) -> String {
    let intent_json = serde_json::to_string_pretty(intent).unwrap_or_else(|_| intent.description.clone());
    format!(
        r#"You are a Business Intelligence Assistant providing insights from tabular data.

User's Original Query: {question}

Query Intent: {intent_json}

Data Retrieved:
{data_summary}

Validation Results: {validation_json}

Your task:
1. Give a clear, concise answer to the user's question.
2. Highlight key insights and patterns.
3. Use specific numbers and metrics from the data.
4. For a summarization request, give a comprehensive overview.
5. Mention any validation warnings diplomatically.

Format with clear headers, bullet points for key insights, properly formatted
numbers, and a professional tone."#
    )
}

pub const RESPONSE_USER_PROMPT: &str = "Generate the response based on the data above.";
