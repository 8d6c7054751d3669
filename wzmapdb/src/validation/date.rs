//! Map date parsing.
//!
//! Dates in map info documents look like `YYYY-MM-DD` with an optional
//! trailing time (`2020-05-17 10:00:00`). Only the date part is significant.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<year>\d{3}\d+)-(?P<month>0[1-9]|1[0-2])-(?P<day>0[1-9]|[1-2][0-9]|3[0-1])",
        )
        .unwrap()
    })
}

/// A date that does not follow the `YYYY-MM-DD[ time]` layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid map info date format: {0}")]
pub struct DateFormatError(pub String);

/// The date part of a map info date string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDate {
    pub year: String,
    pub month: String,
    pub day: String,
}

impl MapDate {
    /// Parse the leading date of `value`.
    pub fn parse(value: &str) -> Result<Self, DateFormatError> {
        let caps = date_pattern()
            .captures(value)
            .ok_or_else(|| DateFormatError(value.to_string()))?;
        Ok(Self {
            year: caps["year"].to_string(),
            month: caps["month"].to_string(),
            day: caps["day"].to_string(),
        })
    }

    /// `YYYY-MM-DD`, with the digits exactly as written.
    pub fn to_ymd(&self) -> String {
        format!("{}-{}-{}", self.year, self.month, self.day)
    }

    /// Numeric year, `None` if it does not fit.
    pub fn year_number(&self) -> Option<i32> {
        self.year.parse().ok()
    }

    /// Calendar date, `None` for days that do not exist (e.g. February 31st).
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            self.year_number()?,
            self.month.parse().ok()?,
            self.day.parse().ok()?,
        )
    }
}

/// Reduce a map info date to `YYYY-MM-DD`.
pub fn to_yyyy_mm_dd(value: &str) -> Result<String, DateFormatError> {
    MapDate::parse(value).map(|d| d.to_ymd())
}
