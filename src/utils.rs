/// Shared naming helpers for the admissions pipeline
///
/// Region identity travels through the pipeline in two forms: the slug used
/// for directory and file names (`South_West`) and the display name written
/// into the `Region` and `Organisation` columns (`South West`). The display
/// name is the slug with `_` swapped for a space.
use std::path::Path;

/// Tokens that end the region part of a workbook file name
const REGION_STOP_TOKENS: [&str; 6] = [
    "residents",
    "resident",
    "abi",
    "admissions",
    "admission",
    "data",
];

/// Joining words kept lowercase unless they open the name
const LOWERCASE_WORDS: [&str; 3] = ["and", "of", "the"];

/// Derive the region slug from a workbook file name
///
/// Region names in the source exports lead the file name and are followed by
/// a fixed description ("residents", "abi", "admissions").
///
/// # Examples
///
/// ```
/// use abi_admissions_pipeline::utils::region_slug_from_file_name;
///
/// assert_eq!(
///     region_slug_from_file_name("south-west-residents-abi-admissions.xlsx").unwrap(),
///     "South_West"
/// );
/// assert_eq!(
///     region_slug_from_file_name("east-of-england-residents.xlsx").unwrap(),
///     "East_of_England"
/// );
/// ```
pub fn region_slug_from_file_name(file_name: &str) -> Result<String, &'static str> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or("File name has no stem")?;

    let lowered = stem.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .take_while(|t| !REGION_STOP_TOKENS.contains(t))
        .collect();

    if tokens.is_empty() {
        return Err("No region name found before the description tokens");
    }

    let words: Vec<String> = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            if i > 0 && LOWERCASE_WORDS.contains(token) {
                token.to_string()
            } else {
                capitalise(token)
            }
        })
        .collect();

    Ok(words.join("_"))
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Display form of a region slug: `South_West` -> `South West`
pub fn region_display_name(slug: &str) -> String {
    slug.replace('_', " ")
}

/// Year-files are the CSV files whose name starts with a digit (`2006_07.csv`)
pub fn is_year_file(path: &Path) -> bool {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let starts_with_digit = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.chars().next())
        .is_some_and(|c| c.is_ascii_digit());

    is_csv && starts_with_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_slug_south_west() {
        assert_eq!(
            region_slug_from_file_name("south-west-residents-abi-admissions.xlsx").unwrap(),
            "South_West"
        );
    }

    #[test]
    fn test_region_slug_lowercase_joining_words() {
        assert_eq!(
            region_slug_from_file_name("yorkshire-and-the-humber-residents-abi.xlsx").unwrap(),
            "Yorkshire_and_the_Humber"
        );
    }

    #[test]
    fn test_region_slug_without_description() {
        assert_eq!(region_slug_from_file_name("london.xlsx").unwrap(), "London");
    }

    #[test]
    fn test_region_slug_with_directory() {
        assert_eq!(
            region_slug_from_file_name("england_data/north-east_residents.xls").unwrap(),
            "North_East"
        );
    }

    #[test]
    fn test_region_slug_mixed_case_input() {
        assert_eq!(
            region_slug_from_file_name("West Midlands ABI admissions.xlsx").unwrap(),
            "West_Midlands"
        );
    }

    #[test]
    fn test_region_slug_description_only() {
        assert!(region_slug_from_file_name("residents-abi-admissions.xlsx").is_err());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(region_display_name("East_of_England"), "East of England");
        assert_eq!(region_display_name("London"), "London");
    }

    #[test]
    fn test_is_year_file() {
        assert!(is_year_file(Path::new("processed_data/South_West/2006_07.csv")));
        assert!(!is_year_file(Path::new("processed_data/South_West/South_West.csv")));
        assert!(!is_year_file(Path::new("processed_data/South_West/Regional_total.csv")));
        assert!(!is_year_file(Path::new("processed_data/South_West/2006_07.txt")));
    }
}
