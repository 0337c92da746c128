use crate::error::{PipelineError, Result};
use chrono::{Datelike, NaiveDate};

/// What a column label says about its period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodLabel {
    /// `"YYYY"`
    Year(i32),
    /// `"YYYY-MM"`
    Month { year: i32, month: u32 },
    /// `"YYYY-MM-DD"`
    Date(NaiveDate),
    Other,
}

impl PeriodLabel {
    pub fn year(&self) -> Option<i32> {
        match self {
            PeriodLabel::Year(y) => Some(*y),
            PeriodLabel::Month { year, .. } => Some(*year),
            PeriodLabel::Date(d) => Some(d.year()),
            PeriodLabel::Other => None,
        }
    }
}

pub fn classify(label: &str) -> PeriodLabel {
    let s = label.trim();
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(y) = s.parse() {
            return PeriodLabel::Year(y);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return PeriodLabel::Date(d);
    }
    if s.len() == 7 {
        if let Ok(d) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
            return PeriodLabel::Month {
                year: d.year(),
                month: d.month(),
            };
        }
    }
    PeriodLabel::Other
}

/// Parse a `"YYYY"` label into the integer period the trend model uses.
pub fn parse_year(label: &str) -> Result<i32> {
    match classify(label) {
        PeriodLabel::Year(y) => Ok(y),
        _ => Err(PipelineError::InvalidPeriod {
            label: label.to_string(),
            reason: "expected a four-digit year".into(),
        }),
    }
}

/// The coarse-grained prefix of a fine-grained label, e.g. `"2020"` for `"2020-03"`.
/// `None` when the label carries no separator.
pub fn coarse_prefix(label: &str, separator: char) -> Option<&str> {
    label.split_once(separator).map(|(prefix, _)| prefix)
}
