/// Per-year totals for a regional table
///
/// Counts are summed across organisations. Rates are averaged without
/// weighting, since the source carries no population denominators.
use std::collections::HashMap;

use crate::schema::{is_count_column, is_rate_column, FINANCIAL_YEAR, REGIME, REGION};
use crate::table::{parse_number, Grid};

pub const REGIONAL_TOTAL_FILE: &str = "Regional_total.csv";

/// Header of the regional total table, derived from the combined header
pub fn totals_header(combined_header: &[String]) -> Vec<String> {
    let mut header: Vec<String> = [REGION, FINANCIAL_YEAR, REGIME, "Organisations"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    header.extend(
        combined_header
            .iter()
            .filter(|c| is_count_column(c) || is_rate_column(c))
            .cloned(),
    );
    header
}

/// Aggregate a combined regional grid (header row first) into one row per
/// financial year, in the order years first appear.
pub fn regional_totals(region: &str, combined: &[Vec<String>]) -> Grid {
    let Some(header) = combined.first() else {
        return Vec::new();
    };
    let position = |name: &str| header.iter().position(|c| c == name);
    let (Some(year_col), Some(regime_col)) = (position(FINANCIAL_YEAR), position(REGIME)) else {
        return vec![totals_header(header)];
    };

    let metric_cols: Vec<(usize, bool)> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            if is_count_column(name) {
                Some((idx, true))
            } else if is_rate_column(name) {
                Some((idx, false))
            } else {
                None
            }
        })
        .collect();

    let mut years: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Vec<String>>> = HashMap::new();
    for row in &combined[1..] {
        let year = row.get(year_col).cloned().unwrap_or_default();
        groups
            .entry(year.clone())
            .or_insert_with(|| {
                years.push(year);
                Vec::new()
            })
            .push(row);
    }

    let mut out = vec![totals_header(header)];
    for year in years {
        let rows = &groups[&year];
        let regime = rows
            .first()
            .and_then(|r| r.get(regime_col))
            .cloned()
            .unwrap_or_default();

        let mut line = vec![
            region.to_string(),
            year.clone(),
            regime,
            rows.len().to_string(),
        ];
        for &(col, is_count) in &metric_cols {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|r| r.get(col))
                .filter_map(|cell| parse_number(cell))
                .collect();
            let cell = if values.is_empty() {
                String::new()
            } else {
                let sum: f64 = values.iter().sum();
                let value = if is_count {
                    sum
                } else {
                    sum / values.len() as f64
                };
                format_number(value)
            };
            line.push(cell);
        }
        out.push(line);
    }
    out
}

/// Round to two decimals; whole values print without a fraction
pub fn format_number(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    rounded.to_string()
}
