//! Error types for glm-regrid.
//!
//! This module provides a unified error handling approach using `thiserror`.
//! Configuration and parse failures are value-kind errors raised before any
//! I/O; aggregation failures over absent dimensions are attribute-kind; gaps
//! in the archive are reported with the full list of missing dates.

use crate::date_key::DateKey;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for glm-regrid operations.
pub type Result<T> = std::result::Result<T, RegridError>;

/// Errors that can occur while locating, regridding or comparing data.
#[derive(Debug, Error)]
pub enum RegridError {
    /// Satellite name not recognised.
    #[error("Unsupported satellite: {name}")]
    UnsupportedSatellite { name: String },

    /// Naming convention not recognised.
    #[error("Unsupported naming convention: {name}")]
    UnsupportedConvention { name: String },

    /// Aggregate operation not recognised.
    #[error("Unsupported aggregate operation: {name}")]
    UnsupportedAggregation { name: String },

    /// Configuration value out of bounds or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read the configuration file.
    #[error("Cannot read config file {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to deserialize the configuration file.
    #[error("Cannot deserialize config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// No date could be recovered from a path.
    #[error("Cannot parse date from {path}: {reason}")]
    PathParse { path: PathBuf, reason: String },

    /// Date fields do not form a valid calendar date.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Day-of-year and month/day were both supplied and disagree.
    #[error("Day-of-year {day_of_year} disagrees with month {month} day {day} in {year}")]
    DayConflict {
        year: i32,
        day_of_year: u32,
        month: u32,
        day: u32,
    },

    /// An aggregation needs a dimension the source does not have.
    #[error("Aggregation over '{variable}' requires dimension '{dimension}' which is not present")]
    MissingDimension { variable: String, dimension: String },

    /// A variable was expected in a file but is absent.
    #[error("Variable '{variable}' not found in {path}")]
    MissingVariable { variable: String, path: PathBuf },

    /// Neither regridded nor raw data exist for some days.
    #[error("No raw or regridded data for {} day(s): {}", .dates.len(), format_dates(.dates))]
    MissingData { dates: Vec<DateKey> },

    /// Two sources define the same attribute with different values.
    #[error("Conflicting values for attribute '{attribute}': {existing} vs {incoming}")]
    MergeConflict {
        attribute: String,
        existing: String,
        incoming: String,
    },

    /// Two datasets do not share a grid or bin axis.
    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    /// Failed to read or write a NetCDF file.
    #[error("NetCDF error: {0}")]
    NetCDF(String),

    /// Failed to open a file.
    #[error("Failed to open file: {path}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create an output directory.
    #[error("Failed to create directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegridError {
    /// Create a PathParse error.
    pub fn path_parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PathParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingVariable error.
    pub fn missing_variable(variable: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingVariable {
            variable: variable.into(),
            path: path.into(),
        }
    }

    /// Create a MissingDimension error.
    pub fn missing_dimension(variable: impl Into<String>, dimension: impl Into<String>) -> Self {
        Self::MissingDimension {
            variable: variable.into(),
            dimension: dimension.into(),
        }
    }

    /// Create a GridMismatch error.
    pub fn grid_mismatch(msg: impl Into<String>) -> Self {
        Self::GridMismatch(msg.into())
    }
}

impl From<netcdf::Error> for RegridError {
    fn from(err: netcdf::Error) -> Self {
        Self::NetCDF(err.to_string())
    }
}

fn format_dates(dates: &[DateKey]) -> String {
    dates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
