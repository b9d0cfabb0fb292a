//! Calendar-month arithmetic
//!
//! Recurring deposits are charged once per calendar month. A month is
//! represented by its first day (a "period"), so every watermark stored on a
//! deposit is a first-of-month date and comparisons between periods are plain
//! date comparisons.
//!
//! The only place that reads the wall clock is [`Timezone::today`]; everything
//! else takes the date as a parameter.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

/// Errors related to calendar operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Date out of supported range: {0}")]
    OutOfRange(NaiveDate),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Returns the first day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// Returns true if `date` is the first day of its month
pub fn is_first_of_month(date: NaiveDate) -> bool {
    date.day() == 1
}

/// Returns the period (first-of-month) following the one containing `date`
///
/// # Errors
///
/// Returns `CalendarError::OutOfRange` past chrono's maximum date
pub fn next_period(date: NaiveDate) -> Result<NaiveDate, CalendarError> {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .ok_or(CalendarError::OutOfRange(date))
}

/// Number of whole calendar months from the month of `from` to the month of `to`
///
/// Days within the month are ignored, so `2024-01-31 -> 2024-02-01` is one month.
/// The result is negative when `to` lies in an earlier month than `from`.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use core_kernel::months_between;
///
/// let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let apr = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap();
/// assert_eq!(months_between(jan, apr), 3);
/// ```
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// Timezone wrapper used to decide which calendar day "today" is
///
/// Wraps chrono_tz::Tz with string (de)serialisation so it can be read from
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| CalendarError::UnknownTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// The calendar date of `instant` in this timezone
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }

    /// Today's calendar date in this timezone
    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_of_month() {
        assert_eq!(first_of_month(date(2024, 2, 29)), date(2024, 2, 1));
        assert_eq!(first_of_month(date(2024, 3, 1)), date(2024, 3, 1));
    }

    #[test]
    fn test_next_period_rolls_year() {
        assert_eq!(next_period(date(2024, 12, 15)).unwrap(), date(2025, 1, 1));
    }

    #[test]
    fn test_months_between_ignores_day() {
        assert_eq!(months_between(date(2024, 1, 31), date(2024, 2, 1)), 1);
        assert_eq!(months_between(date(2024, 5, 1), date(2024, 3, 1)), -2);
    }

    #[test]
    fn test_timezone_changes_calendar_day() {
        let tz: Timezone = "Asia/Kolkata".parse().unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 3, 31, 20, 0, 0).unwrap();
        assert_eq!(tz.date_of(instant), date(2024, 4, 1));
        assert_eq!(Timezone::default().date_of(instant), date(2024, 3, 31));
    }

    #[test]
    fn test_unknown_timezone() {
        let result: Result<Timezone, _> = "Mars/Olympus".parse();
        assert!(matches!(result, Err(CalendarError::UnknownTimezone(_))));
    }
}
