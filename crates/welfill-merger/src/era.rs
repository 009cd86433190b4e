//! Japanese era calendar
//!
//! Official forms date things as `令和8年5月20日`: the era name followed by
//! the year counted from the era's first year.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors building an era calendar
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EraError {
    /// Era name is blank
    #[error("Era name must not be empty")]
    EmptyName,

    /// Start date is not `YYYY-MM-DD`
    #[error("Invalid era start date: {0}")]
    InvalidStart(String),
}

/// An era: its name and the first day it is in effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraCalendar {
    /// Era name, e.g. `令和`
    pub name: String,
    /// First day of the era's first year
    pub start: NaiveDate,
}

impl Default for EraCalendar {
    /// 令和, from 2019-05-01
    fn default() -> Self {
        Self {
            name: "令和".to_string(),
            start: NaiveDate::from_ymd_opt(2019, 5, 1).unwrap_or_default(),
        }
    }
}

impl EraCalendar {
    /// Build an era from a name and a `YYYY-MM-DD` start date
    pub fn new(name: &str, start: &str) -> Result<Self, EraError> {
        if name.trim().is_empty() {
            return Err(EraError::EmptyName);
        }
        let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")
            .map_err(|_| EraError::InvalidStart(start.to_string()))?;
        Ok(Self {
            name: name.trim().to_string(),
            start,
        })
    }

    /// Validate a deserialized calendar
    pub fn validate(&self) -> Result<(), EraError> {
        if self.name.trim().is_empty() {
            return Err(EraError::EmptyName);
        }
        Ok(())
    }

    /// Era year of `date`, or `None` before the era began
    pub fn year_of(&self, date: NaiveDate) -> Option<i32> {
        if date < self.start {
            return None;
        }
        Some(date.year() - self.start.year() + 1)
    }

    /// `{era}{year}年{month}月{day}日`, unpadded
    pub fn format(&self, date: NaiveDate) -> Option<String> {
        self.year_of(date).map(|year| {
            format!("{}{}年{}月{}日", self.name, year, date.month(), date.day())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reiwa_years() {
        let era = EraCalendar::default();
        assert_eq!(era.year_of(date(2019, 5, 1)), Some(1));
        assert_eq!(era.year_of(date(2020, 1, 1)), Some(2));
        assert_eq!(era.year_of(date(2026, 5, 20)), Some(8));
        assert_eq!(era.format(date(2026, 5, 20)).as_deref(), Some("令和8年5月20日"));
    }

    #[test]
    fn test_before_era_start() {
        let era = EraCalendar::default();
        assert_eq!(era.year_of(date(2019, 4, 30)), None);
        assert_eq!(era.format(date(2010, 1, 1)), None);
    }

    #[test]
    fn test_custom_era() {
        let era = EraCalendar::new("平成", "1989-01-08").unwrap();
        assert_eq!(era.format(date(2019, 4, 30)).as_deref(), Some("平成31年4月30日"));
    }

    #[test]
    fn test_invalid_era() {
        assert_eq!(EraCalendar::new(" ", "2019-05-01"), Err(EraError::EmptyName));
        assert!(matches!(
            EraCalendar::new("令和", "2019/05/01"),
            Err(EraError::InvalidStart(_))
        ));
    }

    #[test]
    fn test_deserialize() {
        let era: EraCalendar =
            serde_json::from_str(r#"{"name": "令和", "start": "2019-05-01"}"#).unwrap();
        assert_eq!(era, EraCalendar::default());
    }
}
