/// Metric header relabelling
///
/// Source sheets describe each metric column across two header rows: a group
/// row where a merged `Rate` cell spans the rate columns, and a metric row
/// naming the gender (`Female`, `Male`, `Total`). The pair collapses into one
/// compound token such as `Female_Rate`; gender columns outside the rate group
/// become `<Gender>_Count`.
use crate::schema::{canonical_metric, GENDERS};

/// Combine a group-row cell and a metric-row cell into a compound metric token.
/// Returns `None` when neither cell names a gender.
pub fn relabel(group: &str, metric: &str) -> Option<String> {
    if let Some(existing) = canonical_metric(metric) {
        return Some(existing.to_string());
    }

    let gender = find_gender(metric).or_else(|| find_gender(group))?;
    let is_rate = contains_rate(metric) || contains_rate(group);
    let suffix = if is_rate { "Rate" } else { "Count" };

    Some(format!("{gender}_{suffix}"))
}

fn find_gender(cell: &str) -> Option<&'static str> {
    cell.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .find_map(|word| {
            GENDERS
                .iter()
                .copied()
                .find(|g| g.eq_ignore_ascii_case(word))
        })
}

fn contains_rate(cell: &str) -> bool {
    cell.to_ascii_lowercase().contains("rate")
}
