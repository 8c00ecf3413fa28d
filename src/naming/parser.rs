//! Recovering dates from file and directory names.
//!
//! Parsing is split in two stages. [`RawFields::from_path`] fills whatever
//! fields the basename carries into a structure where every field is
//! optional; [`RawFields::resolve`] turns that into a total [`ParsedPath`]
//! or fails. Callers that already know some fields set them first and the
//! path only fills the gaps.

use super::NamingConvention;
use crate::date_key::DateKey;
use crate::error::{RegridError, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

const TOKEN_DELIMITER: char = '_';

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// One file per hour.
    HourlyFile,
    /// Raw high-frequency file carrying only a start timestamp token.
    SubHourlyFile,
    /// One directory per day.
    Directory,
}

/// How to treat a day-of-year that disagrees with an explicit month/day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayConflictPolicy {
    /// Fail with [`RegridError::DayConflict`].
    #[default]
    Reject,
    /// Log a warning and keep the day-of-year.
    PreferDayOfYear,
}

/// Options for [`RawFields::resolve`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Use midnight when no start hour is known (directory-level dates).
    pub ignore_missing_hour: bool,
    /// Day-of-year versus month/day precedence.
    pub day_conflict: DayConflictPolicy,
}

impl ResolveOptions {
    /// Options for daily directories.
    pub fn daily() -> Self {
        Self {
            ignore_missing_hour: true,
            ..Self::default()
        }
    }
}

/// Partially known date and version fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    /// Path the fields were read from, kept for error messages.
    pub path: Option<PathBuf>,
    /// Satellite hardware version, e.g. `G16`.
    pub satellite_version: Option<String>,
    /// Grid resolution in degrees, for regridded names.
    pub resolution: Option<f64>,
    /// Calendar year.
    pub year: Option<i32>,
    /// Day of year.
    pub day_of_year: Option<u32>,
    /// Month, only ever set explicitly by callers.
    pub month: Option<u32>,
    /// Day of month, only ever set explicitly by callers.
    pub day: Option<u32>,
    /// First hour covered.
    pub start_hour: Option<u32>,
    /// Minute of the start timestamp (sub-hourly files).
    pub start_minute: Option<u32>,
    /// Hour after the last one covered.
    pub end_hour: Option<u32>,
}

/// A fully resolved path date.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPath {
    /// Start of the covered window.
    pub key: DateKey,
    /// End hour of the window, when known.
    pub end_hour: Option<u32>,
    /// Start minute for sub-hourly files.
    pub start_minute: Option<u32>,
    /// Satellite hardware version, when the name carries one.
    pub satellite_version: Option<String>,
    /// Resolution in degrees, for regridded names.
    pub resolution: Option<f64>,
}

impl RawFields {
    /// Fields set explicitly from a calendar date.
    pub fn with_month_day(mut self, year: i32, month: u32, day: u32) -> Self {
        self.year = Some(year);
        self.month = Some(month);
        self.day = Some(day);
        self
    }

    /// Parse the basename of `path` into a fresh set of fields.
    pub fn from_path(
        path: &Path,
        kind: PathKind,
        regridded: bool,
        convention: NamingConvention,
    ) -> Result<Self> {
        Self::default().fill_from_path(path, kind, regridded, convention)
    }

    /// Fill fields not already set from the basename of `path`.
    pub fn fill_from_path(
        mut self,
        path: &Path,
        kind: PathKind,
        regridded: bool,
        convention: NamingConvention,
    ) -> Result<Self> {
        let stem = basename(path, kind)
            .ok_or_else(|| RegridError::path_parse(path, "path has no file name"))?;
        let mut tokens: Vec<&str> = stem.split(TOKEN_DELIMITER).collect();

        if regridded {
            let first = tokens.first().copied().unwrap_or_default();
            let resolution = parse_resolution(first).ok_or_else(|| {
                RegridError::path_parse(path, "regridded name lacks a '<res>deg' token")
            })?;
            self.resolution.get_or_insert(resolution);
            tokens.remove(0);
        }

        let parsed = match convention {
            NamingConvention::Current => parse_current(&tokens, kind),
            NamingConvention::GlmArray => parse_glm_array(&tokens, kind),
            NamingConvention::VendorArchive => parse_vendor(&tokens, kind),
        }
        .map_err(|reason| RegridError::path_parse(path, reason))?;

        self.path.get_or_insert_with(|| path.to_path_buf());
        self.merge_missing(parsed);
        if self.year.is_none() {
            self.year = convention.implicit_year();
        }
        if kind == PathKind::HourlyFile && self.end_hour.is_none() {
            self.end_hour = self.start_hour.and_then(|h| h.checked_add(1));
        }

        Ok(self)
    }

    fn merge_missing(&mut self, other: RawFields) {
        if self.satellite_version.is_none() {
            self.satellite_version = other.satellite_version;
        }
        if self.year.is_none() {
            self.year = other.year;
        }
        if self.day_of_year.is_none() {
            self.day_of_year = other.day_of_year;
        }
        if self.start_hour.is_none() {
            self.start_hour = other.start_hour;
        }
        if self.start_minute.is_none() {
            self.start_minute = other.start_minute;
        }
        if self.end_hour.is_none() {
            self.end_hour = other.end_hour;
        }
    }

    /// Resolve into a total date, or fail.
    pub fn resolve(&self, options: ResolveOptions) -> Result<ParsedPath> {
        let origin = self.path.clone().unwrap_or_default();
        let year = self
            .year
            .ok_or_else(|| RegridError::path_parse(&origin, "no year field"))?;

        let day_of_year = match (self.day_of_year, self.month, self.day) {
            (Some(doy), Some(month), Some(day)) => {
                let from_calendar = ordinal(year, month, day)?;
                if from_calendar != doy {
                    match options.day_conflict {
                        DayConflictPolicy::Reject => {
                            return Err(RegridError::DayConflict {
                                year,
                                day_of_year: doy,
                                month,
                                day,
                            })
                        }
                        DayConflictPolicy::PreferDayOfYear => warn!(
                            "Day-of-year {} and month/day {}-{} disagree for {}; using day-of-year",
                            doy,
                            month,
                            day,
                            origin.display()
                        ),
                    }
                }
                doy
            }
            (Some(doy), _, _) => doy,
            (None, Some(month), Some(day)) => ordinal(year, month, day)?,
            _ => return Err(RegridError::path_parse(&origin, "no day field")),
        };

        let hour = match self.start_hour {
            Some(hour) => hour,
            None if options.ignore_missing_hour => 0,
            None => return Err(RegridError::path_parse(&origin, "no start hour field")),
        };

        Ok(ParsedPath {
            key: DateKey::new(year, day_of_year, hour)?,
            end_hour: self.end_hour,
            start_minute: self.start_minute,
            satellite_version: self.satellite_version.clone(),
            resolution: self.resolution,
        })
    }
}

/// Parse and resolve a path in one go.
pub fn parse_path(
    path: &Path,
    kind: PathKind,
    regridded: bool,
    convention: NamingConvention,
    options: ResolveOptions,
) -> Result<ParsedPath> {
    RawFields::from_path(path, kind, regridded, convention)?.resolve(options)
}

fn basename(path: &Path, kind: PathKind) -> Option<&str> {
    let name = match kind {
        PathKind::Directory => path.file_name(),
        _ => path.file_stem(),
    };
    name.and_then(|s| s.to_str())
}

fn ordinal(year: i32, month: u32, day: u32) -> Result<u32> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| d.ordinal())
        .ok_or_else(|| RegridError::InvalidDate(format!("{}-{:02}-{:02}", year, month, day)))
}

fn parse_resolution(token: &str) -> Option<f64> {
    token.strip_suffix("deg")?.parse().ok()
}

fn token<'a>(tokens: &[&'a str], from_end: usize) -> std::result::Result<&'a str, String> {
    if from_end == 0 || from_end > tokens.len() {
        return Err(format!("expected at least {} '_'-separated fields", from_end));
    }
    Ok(tokens[tokens.len() - from_end])
}

fn number(token: &str, what: &str) -> std::result::Result<u32, String> {
    token
        .parse()
        .map_err(|_| format!("'{}' is not a valid {}", token, what))
}

/// Hour token; `max` is 23 for a start hour and 24 for an end hour.
fn hour(token: &str, what: &str, max: u32) -> std::result::Result<u32, String> {
    let value = number(token, what)?;
    if value > max {
        return Err(format!("{} {} is out of range 0-{}", what, value, max));
    }
    Ok(value)
}

fn version(token: &str) -> std::result::Result<String, String> {
    let valid = token.len() == 3
        && token.starts_with('G')
        && token[1..].chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(token.to_string())
    } else {
        Err(format!("'{}' is not a satellite version token", token))
    }
}

fn hour_range(token: &str) -> std::result::Result<(u32, u32), String> {
    let (start, end) = token
        .split_once('-')
        .ok_or_else(|| format!("'{}' is not an hour range", token))?;
    Ok((hour(start, "start hour", 23)?, hour(end, "end hour", 24)?))
}

fn parse_current(tokens: &[&str], kind: PathKind) -> std::result::Result<RawFields, String> {
    match kind {
        PathKind::HourlyFile => {
            let (start, end) = hour_range(token(tokens, 1)?)?;
            Ok(RawFields {
                satellite_version: Some(version(token(tokens, 4)?)?),
                year: Some(number(token(tokens, 3)?, "year")? as i32),
                day_of_year: Some(number(token(tokens, 2)?, "day-of-year")?),
                start_hour: Some(start),
                end_hour: Some(end),
                ..RawFields::default()
            })
        }
        PathKind::Directory => Ok(RawFields {
            year: Some(number(token(tokens, 2)?, "year")? as i32),
            day_of_year: Some(number(token(tokens, 1)?, "day-of-year")?),
            ..RawFields::default()
        }),
        PathKind::SubHourlyFile => {
            Err("sub-hourly files only exist under the vendor archive convention".to_string())
        }
    }
}

fn parse_glm_array(tokens: &[&str], kind: PathKind) -> std::result::Result<RawFields, String> {
    if tokens.len() < 3 || tokens[0] != "GLM" || tokens[1] != "array" {
        return Err("expected a 'GLM_array_' name".to_string());
    }
    let is_temp = tokens[tokens.len() - 2] == "temp";
    match kind {
        PathKind::HourlyFile if is_temp => {
            let start = hour(token(tokens, 1)?, "hour", 23)?;
            Ok(RawFields {
                day_of_year: Some(number(token(tokens, 3)?, "day-of-year")?),
                start_hour: Some(start),
                end_hour: Some(start + 1),
                ..RawFields::default()
            })
        }
        PathKind::HourlyFile => {
            let (start, end) = hour_range(token(tokens, 1)?)?;
            Ok(RawFields {
                day_of_year: Some(number(token(tokens, 2)?, "day-of-year")?),
                start_hour: Some(start),
                end_hour: Some(end),
                ..RawFields::default()
            })
        }
        PathKind::Directory => Ok(RawFields {
            day_of_year: Some(number(token(tokens, 1)?, "day-of-year")?),
            ..RawFields::default()
        }),
        PathKind::SubHourlyFile => {
            Err("sub-hourly files only exist under the vendor archive convention".to_string())
        }
    }
}

/// Vendor names are `OR_GLM-L2-LCFA_<Gxx>_s<YYYY><DDD>[<HH><MM><SS><t>]...`.
fn parse_vendor(tokens: &[&str], kind: PathKind) -> std::result::Result<RawFields, String> {
    if tokens.len() < 4 {
        return Err("expected '<PREFIX>_<Gxx>_s<timestamp>'".to_string());
    }
    let satellite_version = Some(version(tokens[2])?);
    let stamp = tokens[3]
        .strip_prefix('s')
        .ok_or_else(|| format!("'{}' is not a start timestamp token", tokens[3]))?;
    let digits = |range: std::ops::Range<usize>, what: &str| {
        stamp
            .get(range)
            .ok_or_else(|| format!("start token '{}' has no {}", stamp, what))
            .and_then(|t| number(t, what))
    };
    let start_hour = || {
        let token = stamp
            .get(7..9)
            .ok_or_else(|| format!("start token '{}' has no hour", stamp))?;
        hour(token, "hour", 23)
    };

    let mut fields = RawFields {
        satellite_version,
        year: Some(digits(0..4, "year")? as i32),
        day_of_year: Some(digits(4..7, "day-of-year")?),
        ..RawFields::default()
    };
    match kind {
        PathKind::Directory => {}
        PathKind::SubHourlyFile => {
            fields.start_hour = Some(start_hour()?);
            fields.start_minute = Some(digits(9..11, "minute")?);
        }
        PathKind::HourlyFile => {
            fields.start_hour = Some(start_hour()?);
        }
    }
    Ok(fields)
}
