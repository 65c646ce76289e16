//! Fixed column vocabulary of the normalized dataset.

pub const ORGANISATION: &str = "Organisation";
pub const FINANCIAL_YEAR: &str = "FinancialYear";
pub const REGIME: &str = "Regime";
pub const REGION: &str = "Region";
pub const YEAR_START: &str = "Year_Start";

/// Leading metadata columns of every normalized year-file
pub const METADATA_COLUMNS: [&str; 3] = [ORGANISATION, FINANCIAL_YEAR, REGIME];

/// Injury categories in output column order
pub const CATEGORIES: [&str; 9] = [
    "All_ABI",
    "Head_injuries",
    "Stroke",
    "Meningitis",
    "Brain_tumour",
    "Other_disorders",
    "Abscess",
    "Anoxia",
    "CO_poisoning",
];

/// Per-category measures in output column order
pub const METRICS: [&str; 6] = [
    "Female_Count",
    "Male_Count",
    "Total_Count",
    "Female_Rate",
    "Male_Rate",
    "Total_Rate",
];

pub const GENDERS: [&str; 3] = ["Female", "Male", "Total"];

/// Replace spaces with underscores and trim
pub fn standardize_token(token: &str) -> String {
    token.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Match a raw category label against the fixed list, ignoring case and
/// spacing: `All ABI` -> `All_ABI`, `co poisoning` -> `CO_poisoning`.
pub fn canonical_category(label: &str) -> Option<&'static str> {
    let token = standardize_token(label);
    CATEGORIES
        .iter()
        .copied()
        .find(|c| c.eq_ignore_ascii_case(&token))
}

/// Match a metric header token against the fixed list
pub fn canonical_metric(header: &str) -> Option<&'static str> {
    let token = standardize_token(header);
    METRICS
        .iter()
        .copied()
        .find(|m| m.eq_ignore_ascii_case(&token))
}

pub fn metric_column(category: &str, metric: &str) -> String {
    format!("{category}_{metric}")
}

/// All `<Category>_<Metric>` columns in order
pub fn metric_columns() -> Vec<String> {
    CATEGORIES
        .iter()
        .flat_map(|c| METRICS.iter().map(move |m| metric_column(c, m)))
        .collect()
}

/// Header row of a normalized year-file
pub fn normalized_header() -> Vec<String> {
    METADATA_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(metric_columns())
        .collect()
}

pub fn is_count_column(name: &str) -> bool {
    name.trim_end().ends_with("_Count")
}

pub fn is_rate_column(name: &str) -> bool {
    name.trim_end().ends_with("_Rate")
}
