use polars::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tabular_insights::catalog::{QueryEngine, SchemaCatalog, TableSource};
use tabular_insights::CatalogSettings;

/// Fresh directory under the system temp dir.
fn temp_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("insights_catalog_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_csv(dir: &PathBuf, file_name: &str, contents: &str) {
    std::fs::write(dir.join(file_name), contents).unwrap();
}

fn sales_dir() -> PathBuf {
    let dir = temp_data_dir();
    write_csv(
        &dir,
        "Amazon Sale Report.csv",
        "Order ID,Qty,ship-city,Amount\nA-1,1,Pune,19.99\nA-2,,Goa,25.00\nA-3,3,Delhi,10.01\n",
    );
    write_csv(&dir, "2023 sales.csv", "sku,stock\nS1,10\nS2,20\n");
    write_csv(&dir, "notes.txt", "not a table");
    dir
}

#[test]
fn test_load_dir_sanitizes_names() {
    let dir = sales_dir();
    let catalog = SchemaCatalog::load_dir(&dir, CatalogSettings::default()).unwrap();

    assert_eq!(catalog.tables(), vec!["table_2023_sales", "amazon_sale_report"]);

    let table = catalog.table("amazon_sale_report").unwrap();
    assert_eq!(table.origin, "Amazon Sale Report.csv");
    let columns: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["order_id", "qty", "ship_city", "amount"]);
}

#[test]
fn test_row_counts_match_relations() {
    let dir = sales_dir();
    let catalog = SchemaCatalog::load_dir(&dir, CatalogSettings::default()).unwrap();

    for table in catalog.table_records() {
        let df = catalog.execute(&format!("SELECT * FROM {}", table.name)).unwrap();
        assert_eq!(df.height(), table.row_count, "row count of {}", table.name);
    }
}

#[test]
fn test_integer_nulls_are_filled() {
    let dir = sales_dir();
    let catalog = SchemaCatalog::load_dir(&dir, CatalogSettings::default()).unwrap();

    let qty = catalog.frame("amazon_sale_report").unwrap().column("qty").unwrap();
    assert!(qty.dtype().is_integer());
    assert_eq!(qty.null_count(), 0);
    assert_eq!(qty.cast(&DataType::Int64).unwrap().i64().unwrap().sum(), Some(4));

    let amount = catalog.frame("amazon_sale_report").unwrap().column("amount").unwrap();
    assert_eq!(amount.dtype(), &DataType::Float64);
}

#[test]
fn test_schema_description_lists_only_loaded_tables() {
    let dir = sales_dir();
    let catalog = SchemaCatalog::load_dir(&dir, CatalogSettings::default()).unwrap();
    let description = catalog.schema_description();

    assert!(description.contains("`amazon_sale_report`"));
    assert!(description.contains("`table_2023_sales`"));
    assert!(description.contains("Amazon Sale Report.csv"));
    assert!(description.contains("Total tables available: 2"));
    assert!(!description.contains("notes"));

    let reminder = description
        .lines()
        .find(|l| l.contains("REMINDER"))
        .expect("reminder line");
    assert!(reminder.contains("`table_2023_sales`, `amazon_sale_report`"));
}

#[test]
fn test_failed_source_is_skipped() {
    let frame = df! {
        "Region" => &["North", "South"],
        "Sales" => &[100i64, 200],
    }
    .unwrap();
    let catalog = SchemaCatalog::load(
        vec![
            TableSource::Csv(temp_data_dir().join("missing.csv")),
            TableSource::Frame {
                origin: "regional sales.csv".to_string(),
                frame,
            },
        ],
        CatalogSettings::default(),
    );

    assert_eq!(catalog.tables(), vec!["regional_sales"]);
    assert!(catalog.schema_description().contains("`region`, `sales`"));
}

#[test]
fn test_colliding_table_names_are_suffixed() {
    let a = df! { "x" => &[1i64] }.unwrap();
    let b = df! { "x" => &[2i64] }.unwrap();
    let catalog = SchemaCatalog::load(
        vec![
            TableSource::Frame {
                origin: "sales.csv".to_string(),
                frame: a,
            },
            TableSource::Frame {
                origin: "Sales.csv".to_string(),
                frame: b,
            },
        ],
        CatalogSettings::default(),
    );
    assert_eq!(catalog.tables(), vec!["sales", "sales_2"]);
    assert_eq!(catalog.table("sales_2").unwrap().origin, "Sales.csv");
}

#[test]
fn test_empty_directory_loads_nothing() {
    let catalog = SchemaCatalog::load_dir(temp_data_dir(), CatalogSettings::default()).unwrap();
    assert!(catalog.is_empty());
    assert!(catalog.schema_description().contains("No tables are loaded"));
}

#[test]
fn test_missing_directory_is_an_error() {
    let missing = temp_data_dir().join("does_not_exist");
    assert!(SchemaCatalog::load_dir(missing, CatalogSettings::default()).is_err());
}

#[test]
fn test_unknown_table_error_is_verbatim() {
    let dir = sales_dir();
    let catalog = SchemaCatalog::load_dir(&dir, CatalogSettings::default()).unwrap();
    let err = catalog.execute("SELECT * FROM all_sales").unwrap_err();
    assert!(err.to_string().contains("all_sales"));
    assert_eq!(err.to_string(), err.message);
}

#[test]
fn test_profile_helpers() {
    let dir = sales_dir();
    let catalog = SchemaCatalog::load_dir(&dir, CatalogSettings::default()).unwrap();

    let summary = catalog.summary_statistics("amazon_sale_report").unwrap().unwrap();
    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.total_columns, 4);
    assert!(summary.numeric_summary.contains_key("amount"));
    assert!(catalog.summary_statistics("nope").unwrap().is_none());

    let found = catalog.search_columns("CITY");
    assert_eq!(found.get("amazon_sale_report"), Some(&vec!["ship_city".to_string()]));

    let insights = catalog.generate_insights().unwrap();
    assert!(insights["amazon_sale_report"].iter().any(|l| l.starts_with("Total amount: 55.00")));
    assert!(insights["table_2023_sales"].iter().any(|l| l == "Total stock: 30"));

    assert_eq!(catalog.sample_rows("amazon_sale_report", 2).height(), 2);
    assert_eq!(catalog.sample_rows("nope", 2).height(), 0);
}

#[tokio::test]
async fn test_concurrent_queries_share_catalog() {
    let dir = sales_dir();
    let catalog = Arc::new(SchemaCatalog::load_dir(&dir, CatalogSettings::default()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let catalog = catalog.clone();
            tokio::spawn(async move {
                QueryEngine::execute(catalog.as_ref(), "SELECT * FROM amazon_sale_report")
                    .map(|df| df.height())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 3);
    }
}

const ORDERS_CSV: &str = "order_id,amount,order_date
1,19.99,04-30-22
2,25.00,04-30-22
Order ID,Amount,SKU
3,10.01,05-01-22
";

fn orders_catalog() -> SchemaCatalog {
    let dir = temp_data_dir();
    write_csv(&dir, "orders.csv", ORDERS_CSV);
    SchemaCatalog::load_dir(&dir, CatalogSettings::default()).unwrap()
}

#[test]
fn test_recommended_functions_run_on_engine() {
    let catalog = orders_catalog();
    let rules = tabular_insights::agent_prompts::SQL_GENERATION_RULES;
    for function in ["CAST(", "REGEXP_LIKE(", "SUBSTR(", "ARRAY_TO_STRING(", "ARRAY_AGG("] {
        assert!(rules.contains(function), "rules no longer mention {}", function);
    }

    let df = catalog
        .execute("SELECT SUM(CAST(amount AS DOUBLE)) AS total FROM orders WHERE REGEXP_LIKE(order_date, '^[0-9]')")
        .unwrap();
    let total = df.column("total").unwrap().f64().unwrap().get(0).unwrap();
    assert!((total - 55.0).abs() < 1e-9, "total was {}", total);

    let df = catalog
        .execute("SELECT SUBSTR(order_date, 1, 2) AS month FROM orders WHERE REGEXP_LIKE(order_date, '^[0-9]')")
        .unwrap();
    let months: Vec<Option<&str>> = df.column("month").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(months, vec![Some("04"), Some("04"), Some("05")]);

    let df = catalog
        .execute("SELECT ARRAY_TO_STRING(ARRAY_AGG(order_id), ', ') AS ids FROM orders WHERE REGEXP_LIKE(order_date, '^[0-9]')")
        .unwrap();
    let ids = df.column("ids").unwrap().str().unwrap().get(0).unwrap().to_string();
    assert_eq!(ids, "1, 2, 3");
}

#[test]
fn test_unsupported_functions_fail_loudly() {
    let catalog = orders_catalog();
    for sql in [
        "SELECT STRING_AGG(order_id, ', ') AS ids FROM orders",
        "SELECT STRPTIME(order_date, '%m-%d-%y') AS d FROM orders",
    ] {
        let err = catalog.execute(sql).unwrap_err();
        assert_eq!(
            tabular_insights::ErrorClassifier::new().classify(&err.message),
            tabular_insights::ErrorKind::UnknownFunction,
            "{}",
            err
        );
    }
}

#[test]
fn test_sum_over_text_column_is_an_error() {
    let catalog = orders_catalog();
    let err = catalog.execute("SELECT SUM(amount) AS total FROM orders").unwrap_err();
    assert!(err.message.contains("type mismatch"), "{}", err);
    assert_eq!(
        tabular_insights::ErrorClassifier::new().classify(&err.message),
        tabular_insights::ErrorKind::TypeMismatch
    );
}
