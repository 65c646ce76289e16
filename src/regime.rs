/// Financial years and the organisational regime in force for each of them
///
/// The regime (PCT, CCG, ICB) is decided by the first calendar year of the
/// financial year alone, through the ordered rule table below.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// `2006-07`, `2006/07`, `2006_07`, `2006-2007` and en-dash forms, with
/// optional surrounding text
static FINANCIAL_YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)((?:19|20)\d{2})\s*[-/_\x{2013}]\s*(\d{4}|\d{2})(?:\D|$)")
        .expect("Invalid financial year regex")
});

/// Organisational-oversight category in effect for a financial year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regime {
    /// Primary Care Trusts
    #[serde(rename = "PCT")]
    Pct,
    /// Clinical Commissioning Groups
    #[serde(rename = "CCG")]
    Ccg,
    /// Integrated Care Boards
    #[serde(rename = "ICB")]
    Icb,
}

/// A contiguous span of starting years mapped to one regime.
/// `last` is inclusive; `None` means open-ended.
#[derive(Debug, Clone, Copy)]
pub struct RegimeRule {
    pub first: i32,
    pub last: Option<i32>,
    pub regime: Regime,
}

/// Ordered year-range rules. Earliest supported year is 2006.
pub const REGIME_RULES: [RegimeRule; 3] = [
    RegimeRule {
        first: 2006,
        last: Some(2012),
        regime: Regime::Pct,
    },
    RegimeRule {
        first: 2013,
        last: Some(2021),
        regime: Regime::Ccg,
    },
    RegimeRule {
        first: 2022,
        last: None,
        regime: Regime::Icb,
    },
];

impl Regime {
    /// Look up the regime for the first year of a financial year
    pub fn for_start_year(year: i32) -> Option<Regime> {
        REGIME_RULES
            .iter()
            .find(|rule| year >= rule.first && rule.last.map_or(true, |last| year <= last))
            .map(|rule| rule.regime)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Pct => "PCT",
            Regime::Ccg => "CCG",
            Regime::Icb => "ICB",
        }
    }

    pub fn parse(value: &str) -> Option<Regime> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PCT" => Some(Regime::Pct),
            "CCG" => Some(Regime::Ccg),
            "ICB" => Some(Regime::Icb),
            _ => None,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UK financial year (April-March), identified by its first calendar year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FinancialYear {
    start: i32,
}

impl FinancialYear {
    pub fn new(start: i32) -> Self {
        Self { start }
    }

    pub fn start_year(&self) -> i32 {
        self.start
    }

    /// Display label, e.g. `2006-07`
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.start, (self.start + 1).rem_euclid(100))
    }

    /// File-name form of the label, e.g. `2006_07`
    pub fn slug(&self) -> String {
        self.label().replace('-', "_")
    }

    pub fn regime(&self) -> Option<Regime> {
        Regime::for_start_year(self.start)
    }

    /// Find a financial-year label inside free text.
    ///
    /// Accepts `2006-07`, `2006/07`, `2006 - 07`, `2006_07`, `2006-2007` and
    /// en-dash variants, optionally surrounded by other text such as
    /// `2006-07 (PCT)`. The second part must be the year after the first.
    pub fn parse(text: &str) -> Option<FinancialYear> {
        let caps = FINANCIAL_YEAR_REGEX.captures(text.trim())?;
        let start: i32 = caps.get(1)?.as_str().parse().ok()?;
        let end_str = caps.get(2)?.as_str();
        let end: i32 = end_str.parse().ok()?;

        let consistent = if end_str.len() == 4 {
            end == start + 1
        } else {
            end == (start + 1).rem_euclid(100)
        };

        consistent.then(|| FinancialYear::new(start))
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
