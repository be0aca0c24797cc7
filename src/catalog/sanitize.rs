//! Name sanitization for tables and columns
//!
//! Both table and column names go through the same rules so that every
//! identifier the model sees can be written unquoted in SQL.

use std::collections::HashSet;

const DIGIT_PREFIX: &str = "table_";
const EMPTY_NAME: &str = "unnamed";

/// Sanitize a source file stem or column header into a SQL identifier.
///
/// Lowercases, turns spaces and hyphens into underscores, spells `&` as
/// `and`, drops anything that is not an ASCII letter, digit or underscore,
/// and prefixes `table_` when the result starts with a digit.
pub fn sanitize_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();

    let mut name = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match c {
            ' ' | '-' => name.push('_'),
            '&' => name.push_str("and"),
            c if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
            _ => {}
        }
    }

    if name.is_empty() {
        return EMPTY_NAME.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, DIGIT_PREFIX);
    }
    name
}

/// Sanitize a list of headers, suffixing `_2`, `_3`, ... onto names that
/// collide after sanitization so no source column is silently dropped.
pub fn sanitize_unique<S: AsRef<str>>(raw_names: &[S]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(raw_names.len());

    for raw in raw_names {
        let name = unique_name(&sanitize_name(raw.as_ref()), &taken);
        taken.insert(name.clone());
        out.push(name);
    }
    out
}

/// First of `base`, `base_2`, `base_3`, ... not present in `taken`.
pub fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clean(name: &str) -> bool {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            && !name.starts_with(|c: char| c.is_ascii_digit())
    }

    #[test]
    fn test_sanitize_file_stems() {
        assert_eq!(sanitize_name("Amazon Sale Report"), "amazon_sale_report");
        assert_eq!(sanitize_name("P & L March-2021"), "p_and_l_march_2021");
        assert_eq!(sanitize_name("2021 Sales"), "table_2021_sales");
        assert_eq!(sanitize_name("Cloud Warehouse (Compersion) Chart"), "cloud_warehouse_compersion_chart");
    }

    #[test]
    fn test_sanitize_column_headers() {
        assert_eq!(sanitize_name("  Order ID "), "order_id");
        assert_eq!(sanitize_name("ship-service-level"), "ship_service_level");
        assert_eq!(sanitize_name("Amount (INR)"), "amount_inr");
        assert_eq!(sanitize_name("%%%"), "unnamed");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "Amazon Sale Report",
            "2021 Sales",
            "P & L",
            "ÉCOLE-Total",
            "%%%",
            "already_clean",
            "9",
            "Qty/Pcs",
        ];
        for input in inputs {
            let once = sanitize_name(input);
            assert_eq!(sanitize_name(&once), once, "not idempotent for {:?}", input);
            assert!(is_clean(&once), "unclean output {:?} for {:?}", once, input);
        }
    }

    #[test]
    fn test_colliding_columns_are_suffixed() {
        let names = sanitize_unique(&["Order ID", "order-id", "order_id", "Amount"]);
        assert_eq!(names, vec!["order_id", "order_id_2", "order_id_3", "amount"]);
    }
}
