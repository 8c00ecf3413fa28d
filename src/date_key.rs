//! The `(year, day-of-year, hour)` storage address.
//!
//! Directories are sharded by day-of-year and files by hour within a day, so
//! every stored artifact is addressed by a [`DateKey`]. The derived ordering
//! compares year, then day-of-year, then hour.

use crate::error::{RegridError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Storage address of one hour of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey {
    year: i32,
    day_of_year: u32,
    hour: u32,
}

impl DateKey {
    /// Create a key, validating day-of-year against the calendar and hour < 24.
    pub fn new(year: i32, day_of_year: u32, hour: u32) -> Result<Self> {
        if NaiveDate::from_yo_opt(year, day_of_year).is_none() {
            return Err(RegridError::InvalidDate(format!(
                "day-of-year {} does not exist in {}",
                day_of_year, year
            )));
        }
        if hour > 23 {
            return Err(RegridError::InvalidDate(format!("hour {} out of range", hour)));
        }
        Ok(Self {
            year,
            day_of_year,
            hour,
        })
    }

    /// Key for the hour containing `datetime`.
    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self {
            year: datetime.year(),
            day_of_year: datetime.ordinal(),
            hour: datetime.hour(),
        }
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Day of year, 1-based.
    pub fn day_of_year(&self) -> u32 {
        self.day_of_year
    }

    /// Hour of day.
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Calendar date of this key.
    pub fn date(&self) -> NaiveDate {
        // validated in `new`/`from_datetime`
        NaiveDate::from_yo_opt(self.year, self.day_of_year).unwrap_or_default()
    }

    /// Start of the hour this key addresses.
    pub fn to_datetime(&self) -> NaiveDateTime {
        self.date()
            .and_hms_opt(self.hour, 0, 0)
            .unwrap_or_default()
    }

    /// The same day at midnight.
    pub fn day(&self) -> Self {
        Self { hour: 0, ..*self }
    }

    /// Whether `start <= self <= end`.
    pub fn within(&self, start: &DateKey, end: &DateKey) -> bool {
        start <= self && self <= end
    }

    /// Daily keys (hour 0) from the day of `start` to the day of `end`, inclusive.
    pub fn days_between(start: &DateKey, end: &DateKey) -> Vec<DateKey> {
        let mut days = Vec::new();
        let last = end.date();
        let mut current = start.date();
        while current <= last {
            days.push(Self::from_datetime(current.and_time(Default::default())));
            current += Duration::days(1);
        }
        days
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03} {:02}:00", self.year, self.day_of_year, self.hour)
    }
}

/// Accepts `YYYY-MM-DD[THH:MM[:SS]]`, `YYYY-MM-DDTHH` and `YYYY-DDD[THH]`.
/// A date without a time means hour 0.
impl FromStr for DateKey {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self::from_datetime(dt));
            }
        }

        let (date, hour) = match s.split_once(['T', ' ']) {
            Some((date, hour)) => (date, Some(hour)),
            None => (s, None),
        };
        let hour = match hour {
            Some(h) => h
                .parse()
                .map_err(|_| RegridError::InvalidDate(format!("'{}' has no valid hour", s)))?,
            None => 0,
        };
        if let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            return Self::new(d.year(), d.ordinal(), hour);
        }
        match date.split_once('-') {
            Some((year, doy)) if doy.len() == 3 => {
                let year = year.parse().ok();
                let doy = doy.parse().ok();
                match (year, doy) {
                    (Some(year), Some(doy)) => Self::new(year, doy, hour),
                    _ => Err(RegridError::InvalidDate(s.to_string())),
                }
            }
            _ => Err(RegridError::InvalidDate(s.to_string())),
        }
    }
}
