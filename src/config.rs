//! Parsing and checking of the configuration file.
//!
//! The configuration file is YAML deserialized with `serde`. Every section
//! is optional; an absent section takes the defaults below. The structures
//! here correspond field by field to the keys of the file, for example:
//!
//! ```yaml
//! storage:
//!   raw_root: /data/glm/raw
//!   regrid_root: /data/glm/regrid
//! grid:
//!   lat_min: -89.75
//!   lat_max: 90.0
//!   lon_min: -179.75
//!   lon_max: 180.0
//!   resolution: 0.5
//! satellite: G16
//! raw_convention: current
//! day_conflict: reject
//! aggregations:
//!   - variable: flash
//!     operation: count
//!   - variable: flash_energy
//!     operation: histogram
//!     bins: { min: -16.0, max: -10.0, step: 0.25 }
//! ```

use crate::error::{RegridError, Result};
use crate::grid::{AggregateRequest, Aggregation, BinEdges, GridSpec};
use crate::naming::{DayConflictPolicy, NamingConvention, ResolveOptions, Satellite, StorageLayout};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default file name prefix of GLM L2 flash products.
pub const DEFAULT_PREFIX: &str = "OR_GLM-L2-LCFA";

/// Where raw and regridded files live.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Root of the raw daily directories.
    #[serde(default = "StorageConfig::default_raw_root")]
    pub raw_root: PathBuf,

    /// Root of the regridded daily directories.
    #[serde(default = "StorageConfig::default_regrid_root")]
    pub regrid_root: PathBuf,

    /// _(Optional)_ File name prefix. Defaults to `OR_GLM-L2-LCFA`.
    #[serde(default = "StorageConfig::default_prefix")]
    pub prefix: String,
}

impl StorageConfig {
    fn default_raw_root() -> PathBuf {
        PathBuf::from("glm/raw")
    }

    fn default_regrid_root() -> PathBuf {
        PathBuf::from("glm/regrid")
    }

    fn default_prefix() -> String {
        DEFAULT_PREFIX.to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_root: Self::default_raw_root(),
            regrid_root: Self::default_regrid_root(),
            prefix: Self::default_prefix(),
        }
    }
}

/// One output variable of the regridder.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationConfig {
    /// Source variable. For `count` it only names the output.
    pub variable: String,

    /// `count` or `histogram`.
    pub operation: String,

    /// Log10 bin edges, required for `histogram`.
    #[serde(default)]
    pub bins: Option<BinEdges>,
}

/// Top-level configuration.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Storage roots and prefix.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Target grid. Producer and consumer must agree on it.
    #[serde(default)]
    pub grid: GridSpec,

    /// Satellite whose files are regridded and assembled.
    #[serde(default)]
    pub satellite: Satellite,

    /// Naming convention of the raw archive.
    #[serde(default)]
    pub raw_convention: NamingConvention,

    /// What to do when day-of-year and month/day disagree.
    #[serde(default)]
    pub day_conflict: DayConflictPolicy,

    /// Output variables, computed in order.
    #[serde(default = "Config::default_aggregations")]
    pub aggregations: Vec<AggregationConfig>,

    /// Source global attributes copied into regridded files.
    #[serde(default = "Config::default_provenance_attributes")]
    pub provenance_attributes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            grid: GridSpec::default(),
            satellite: Satellite::default(),
            raw_convention: NamingConvention::default(),
            day_conflict: DayConflictPolicy::default(),
            aggregations: Self::default_aggregations(),
            provenance_attributes: Self::default_provenance_attributes(),
        }
    }
}

impl Config {
    /// Read, deserialize and check a configuration file.
    pub fn new_from_file(file_path: &Path) -> Result<Config> {
        let data = fs::read(file_path).map_err(|source| RegridError::ConfigRead {
            path: file_path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_slice(data.as_slice())?;

        config.check_bounds()?;

        Ok(config)
    }

    /// Checks the configuration before any file is touched.
    pub fn check_bounds(&self) -> Result<()> {
        self.grid.check_bounds()?;

        if self.storage.prefix.trim().is_empty() {
            return Err(RegridError::InvalidConfig(
                "File name prefix cannot be empty".to_string(),
            ));
        }

        if self.aggregations.is_empty() {
            return Err(RegridError::InvalidConfig(
                "At least one aggregation must be configured".to_string(),
            ));
        }

        self.aggregate_requests().map(|_| ())
    }

    /// Aggregations as validated requests.
    ///
    /// Fails on unknown operations and on two requests with the same output.
    pub fn aggregate_requests(&self) -> Result<Vec<AggregateRequest>> {
        let mut names = BTreeSet::new();
        let mut requests = Vec::with_capacity(self.aggregations.len());
        for agg in &self.aggregations {
            let request = AggregateRequest::from_parts(&agg.variable, &agg.operation, agg.bins)?;
            if !names.insert(request.output_name()) {
                return Err(RegridError::InvalidConfig(format!(
                    "Output '{}' is configured twice",
                    request.output_name()
                )));
            }
            requests.push(request);
        }
        Ok(requests)
    }

    /// Output name of the first count aggregation.
    pub fn count_variable(&self) -> Result<String> {
        self.aggregate_requests()?
            .into_iter()
            .find(|r| r.aggregation == Aggregation::Count)
            .map(|r| r.output_name())
            .ok_or_else(|| RegridError::InvalidConfig("No count aggregation is configured".to_string()))
    }

    /// Storage layout for the configured roots and grid resolution.
    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(
            &self.storage.raw_root,
            &self.storage.regrid_root,
            &self.storage.prefix,
            self.grid.resolution,
        )
    }

    /// Options for resolving hourly file names.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            ignore_missing_hour: false,
            day_conflict: self.day_conflict,
        }
    }

    fn default_aggregations() -> Vec<AggregationConfig> {
        vec![
            AggregationConfig {
                variable: "flash".to_string(),
                operation: "count".to_string(),
                bins: None,
            },
            AggregationConfig {
                variable: "flash_energy".to_string(),
                operation: "histogram".to_string(),
                bins: Some(BinEdges {
                    min: -16.0,
                    max: -10.0,
                    step: 0.25,
                }),
            },
            AggregationConfig {
                variable: "flash_area".to_string(),
                operation: "histogram".to_string(),
                bins: Some(BinEdges {
                    min: 7.0,
                    max: 11.0,
                    step: 0.25,
                }),
            },
        ]
    }

    fn default_provenance_attributes() -> Vec<String> {
        [
            "platform_ID",
            "orbital_slot",
            "instrument_type",
            "instrument_ID",
            "production_site",
            "production_environment",
            "spatial_resolution",
            "processing_level",
            "time_coverage_start",
            "time_coverage_end",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}
