//! CF-style time coordinates (`"<unit> since <epoch>"`).

use crate::error::{RegridError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Units written to every time coordinate this crate produces.
///
/// A day-based unit would truncate hourly stamps, so time is always stored
/// as 64-bit float nanoseconds since the Unix epoch.
pub const NANOSECONDS_SINCE_EPOCH: &str = "nanoseconds since 1970-01-01";

/// Parsed CF time units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    nanos_per_unit: f64,
    epoch: NaiveDateTime,
}

impl TimeUnits {
    /// Units used for output files.
    pub fn nanoseconds_since_epoch() -> Self {
        Self {
            nanos_per_unit: 1.0,
            epoch: NaiveDateTime::default(),
        }
    }

    /// Parse a units string such as `"seconds since 2000-01-01 12:00:00"`.
    pub fn parse(units: &str) -> Result<Self> {
        let invalid = || RegridError::NetCDF(format!("Unrecognised time units '{}'", units));
        let (unit, epoch) = units.split_once(" since ").ok_or_else(invalid)?;

        let nanos_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
            "nanoseconds" | "nanosecond" | "ns" => 1.0,
            "microseconds" | "microsecond" | "us" => 1e3,
            "milliseconds" | "millisecond" | "ms" => 1e6,
            "seconds" | "second" | "secs" | "sec" | "s" => 1e9,
            "minutes" | "minute" | "mins" | "min" => 60e9,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3600e9,
            "days" | "day" | "d" => 86400e9,
            _ => return Err(invalid()),
        };

        Ok(Self {
            nanos_per_unit,
            epoch: parse_epoch(epoch.trim()).ok_or_else(invalid)?,
        })
    }

    /// Timestamp for a stored value.
    pub fn decode(&self, value: f64) -> NaiveDateTime {
        let nanos = (value * self.nanos_per_unit).round() as i64;
        self.epoch + Duration::nanoseconds(nanos)
    }

    /// Stored value for a timestamp.
    pub fn encode(&self, time: NaiveDateTime) -> f64 {
        let delta = time - self.epoch;
        match delta.num_nanoseconds() {
            Some(nanos) => nanos as f64 / self.nanos_per_unit,
            None => delta.num_seconds() as f64 * 1e9 / self.nanos_per_unit,
        }
    }
}

fn parse_epoch(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim_end_matches('Z').trim_end_matches(" UTC");
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H",
        "%Y%m%d %H%M%S",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn nanosecond_units_keep_hours() {
        let units = TimeUnits::parse(NANOSECONDS_SINCE_EPOCH).unwrap();
        let t = at("2018-06-05 19:00:00");
        let stored = units.encode(t);
        assert_eq!(units.decode(stored), t);
        assert_eq!(units, TimeUnits::nanoseconds_since_epoch());
    }

    #[test]
    fn parses_glm_and_flexpart_epochs() {
        let glm = TimeUnits::parse("seconds since 2000-01-01 12:00:00").unwrap();
        assert_eq!(glm.decode(3600.0), at("2000-01-01 13:00:00"));

        let flexpart = TimeUnits::parse("seconds since 2018-06-05 00:00").unwrap();
        assert_eq!(flexpart.decode(-7200.0), at("2018-06-04 22:00:00"));

        let days = TimeUnits::parse("days since 1970-01-01T00:00:00Z").unwrap();
        assert_eq!(days.decode(1.5), at("1970-01-02 12:00:00"));
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(TimeUnits::parse("fortnights since 2000-01-01").is_err());
        assert!(TimeUnits::parse("seconds").is_err());
    }
}
