//! Composition of the two mirrors into the reporting view.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{DataItem, EngineError, records::cmp_date_desc};

/// Which entity kinds are visible in the composed view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    TravelOnly,
    BusinessOnly,
    #[default]
    Total,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TravelOnly => "travel",
            Self::BusinessOnly => "business",
            Self::Total => "total",
        }
    }
}

impl FromStr for ViewMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "travel" | "travel_only" => Ok(Self::TravelOnly),
            "business" | "business_only" => Ok(Self::BusinessOnly),
            "total" | "all" => Ok(Self::Total),
            other => Err(EngineError::InvalidFilter(format!("unknown view mode: {other}"))),
        }
    }
}

/// `all`, or a `YYYY-MM` prefix matched against record dates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MonthFilter {
    #[default]
    All,
    Month(String),
}

impl MonthFilter {
    pub fn matches(&self, date: &str) -> bool {
        match self {
            Self::All => true,
            Self::Month(prefix) => date.starts_with(prefix.as_str()),
        }
    }
}

impl FromStr for MonthFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        if trimmed.chars().count() != 7 {
            return Err(EngineError::InvalidFilter(format!(
                "month filter must be \"all\" or YYYY-MM, got \"{trimmed}\""
            )));
        }
        Ok(Self::Month(trimmed.to_string()))
    }
}

impl TryFrom<String> for MonthFilter {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthFilter> for String {
    fn from(value: MonthFilter) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MonthFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Month(prefix) => f.write_str(prefix),
        }
    }
}

/// View mode and month filter currently selected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub mode: ViewMode,
    pub month: MonthFilter,
}

/// Builds the composed view.
///
/// Sources are picked by `mode` (`Total` is travel followed by business),
/// filtered by `month` with a plain prefix comparison and sorted newest
/// first. The sort is stable, so records sharing a date keep their mirror
/// order and travel records precede business ones.
pub fn compose(
    travel: &[DataItem],
    business: &[DataItem],
    mode: ViewMode,
    month: &MonthFilter,
) -> Vec<DataItem> {
    let sources: Vec<&[DataItem]> = match mode {
        ViewMode::TravelOnly => vec![travel],
        ViewMode::BusinessOnly => vec![business],
        ViewMode::Total => vec![travel, business],
    };

    let mut items: Vec<DataItem> = sources
        .into_iter()
        .flatten()
        .filter(|item| month.matches(item.date()))
        .cloned()
        .collect();
    items.sort_by(|a, b| cmp_date_desc(a.date(), b.date()));
    items
}

/// Distinct `YYYY-MM` prefixes across both mirrors, newest first.
///
/// Independent of the view mode so the month selector always lists the full
/// dataset.
pub fn available_months(travel: &[DataItem], business: &[DataItem]) -> Vec<String> {
    let months: BTreeSet<String> = travel
        .iter()
        .chain(business)
        .filter_map(|item| month_prefix(item.date()))
        .collect();
    months.into_iter().rev().collect()
}

fn month_prefix(date: &str) -> Option<String> {
    let prefix: String = date.chars().take(7).collect();
    (prefix.chars().count() == 7).then_some(prefix)
}
