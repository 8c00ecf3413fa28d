//! Nearest-neighbour binning of flashes and per-cell aggregation.

use super::spec::{nearest, GridSpec};
use crate::data::{AttrValue, Attributes, BinAxis, FlashObservations, GriddedVariable};
use crate::error::{RegridError, Result};
use ndarray::{Array3, Array4};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const EDGE_TOLERANCE: f64 = 1e-9;

/// Log10 histogram edges `min, min + step, ..., max`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BinEdges {
    /// Lowest edge.
    pub min: f64,
    /// Highest edge, included.
    pub max: f64,
    /// Spacing between edges.
    pub step: f64,
}

impl BinEdges {
    /// Validated edges.
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self> {
        let edges = Self { min, max, step };
        edges.check()?;
        Ok(edges)
    }

    /// Fails unless `step` is positive and `min < max`.
    pub fn check(&self) -> Result<()> {
        if !(self.step > 0.0) || !(self.min < self.max) {
            return Err(RegridError::InvalidConfig(format!(
                "Histogram edges need min < max and a positive step, got {}..{} by {}",
                self.min, self.max, self.step
            )));
        }
        Ok(())
    }

    /// Edge values, ascending, inclusive of `max`.
    pub fn edges(&self) -> Vec<f64> {
        let n = ((self.max - self.min) / self.step + EDGE_TOLERANCE).floor() as usize + 1;
        (0..n).map(|i| self.min + i as f64 * self.step).collect()
    }
}

/// Aggregate operation applied to each grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// Number of flashes in the cell.
    Count,
    /// Histogram of `log10(value)` over the given edges.
    LogHistogram(BinEdges),
}

/// Operation names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `count`
    Count,
    /// `histogram`
    Histogram,
}

impl FromStr for Operation {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "histogram" | "hist" | "log_histogram" => Ok(Self::Histogram),
            _ => Err(RegridError::UnsupportedAggregation {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => write!(f, "count"),
            Self::Histogram => write!(f, "histogram"),
        }
    }
}

/// One output variable to compute from a source variable.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRequest {
    /// Source variable, e.g. `flash_energy`. Counts only use it for naming.
    pub variable: String,
    /// Operation.
    pub aggregation: Aggregation,
}

impl AggregateRequest {
    /// Flash count named `<variable>_count`.
    pub fn count(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            aggregation: Aggregation::Count,
        }
    }

    /// Log10 histogram of `variable`.
    pub fn log_histogram(variable: impl Into<String>, bins: BinEdges) -> Self {
        Self {
            variable: variable.into(),
            aggregation: Aggregation::LogHistogram(bins),
        }
    }

    /// Build a request from an operation name.
    ///
    /// Unknown operations fail with [`RegridError::UnsupportedAggregation`];
    /// histograms need `bins`.
    pub fn from_parts(variable: &str, operation: &str, bins: Option<BinEdges>) -> Result<Self> {
        match operation.parse::<Operation>()? {
            Operation::Count => Ok(Self::count(variable)),
            Operation::Histogram => {
                let bins = bins.ok_or_else(|| {
                    RegridError::InvalidConfig(format!(
                        "Histogram of '{}' needs bin edges",
                        variable
                    ))
                })?;
                bins.check()?;
                Ok(Self::log_histogram(variable, bins))
            }
        }
    }

    /// Name of the output variable.
    pub fn output_name(&self) -> String {
        match self.aggregation {
            Aggregation::Count => format!("{}_count", self.variable),
            Aggregation::LogHistogram(_) => format!("{}_log_hist", self.variable),
        }
    }

    /// Name of the histogram bin dimension, if any.
    pub fn bin_dimension(&self) -> Option<String> {
        match self.aggregation {
            Aggregation::Count => None,
            Aggregation::LogHistogram(_) => Some(format!("{}_log_bin", self.variable)),
        }
    }

    /// Whether the request reads per-flash values of its variable.
    pub fn reads_variable(&self) -> bool {
        matches!(self.aggregation, Aggregation::LogHistogram(_))
    }
}

/// An aggregated variable and the global attributes it contributes.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutput {
    /// Output variable name.
    pub name: String,
    /// Per-cell values with a single time step.
    pub variable: GriddedVariable,
    /// Global attributes to merge into the target dataset.
    pub global_attributes: Attributes,
}

/// Flashes snapped onto a grid, ready for aggregation.
#[derive(Debug)]
pub struct SnappedFlashes<'a> {
    observations: &'a FlashObservations,
    resolution: f64,
    shape: (usize, usize),
    groups: BTreeMap<(usize, usize), Vec<usize>>,
}

impl<'a> SnappedFlashes<'a> {
    /// Snap every flash to its nearest cell centre and group by cell.
    ///
    /// Flashes with a non-finite coordinate are left out.
    pub fn new(grid: &GridSpec, observations: &'a FlashObservations) -> Self {
        let latitudes = grid.latitudes();
        let longitudes = grid.longitudes();
        let mut groups: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (i, (&lat, &lon)) in observations
            .latitude
            .iter()
            .zip(&observations.longitude)
            .enumerate()
        {
            if let (Some(y), Some(x)) = (nearest(&latitudes, lat), nearest(&longitudes, lon)) {
                groups.entry((y, x)).or_default().push(i);
            }
        }
        Self {
            observations,
            resolution: grid.resolution,
            shape: (latitudes.len(), longitudes.len()),
            groups,
        }
    }

    /// Number of cells holding at least one flash.
    pub fn observed_cells(&self) -> usize {
        self.groups.len()
    }

    /// Run one aggregation over the grouped flashes.
    pub fn aggregate(&self, request: &AggregateRequest) -> Result<AggregateOutput> {
        let variable = match request.aggregation {
            Aggregation::Count => self.count(request),
            Aggregation::LogHistogram(bins) => self.log_histogram(request, &bins)?,
        };
        let global_attributes = [(
            "grid_resolution".to_string(),
            AttrValue::Double(self.resolution),
        )]
        .into_iter()
        .collect();
        Ok(AggregateOutput {
            name: request.output_name(),
            variable,
            global_attributes,
        })
    }

    fn count(&self, request: &AggregateRequest) -> GriddedVariable {
        let (ny, nx) = self.shape;
        let mut counts = Array3::from_elem((1, ny, nx), None);
        for (&(y, x), members) in &self.groups {
            counts[[0, y, x]] = Some(members.len() as u32);
        }

        let attributes = [
            (
                "long_name".to_string(),
                AttrValue::from(format!("number of {} events per grid cell", request.variable)),
            ),
            ("units".to_string(), AttrValue::from("1")),
        ]
        .into_iter()
        .collect();
        GriddedVariable::counts(counts, attributes)
    }

    fn log_histogram(&self, request: &AggregateRequest, bins: &BinEdges) -> Result<GriddedVariable> {
        let source = self
            .observations
            .variables
            .get(&request.variable)
            .filter(|v| v.dimension == self.observations.dimension)
            .ok_or_else(|| {
                RegridError::missing_dimension(&request.variable, &self.observations.dimension)
            })?;

        let edges = bins.edges();
        let (ny, nx) = self.shape;
        let mut hist = Array4::from_elem((1, edges.len(), ny, nx), None);
        for (&(y, x), members) in &self.groups {
            let logs: Vec<f64> = members.iter().map(|&i| source.values[i].log10()).collect();
            for (b, count) in cell_histogram(&logs, &edges).into_iter().enumerate() {
                hist[[0, b, y, x]] = Some(count);
            }
        }

        let attributes = [
            (
                "long_name".to_string(),
                AttrValue::from(format!("histogram of log10({})", request.variable)),
            ),
            (
                "comment".to_string(),
                AttrValue::from("bin i counts values v with edge[i-1] <= log10(v) < edge[i]"),
            ),
        ]
        .into_iter()
        .collect();
        Ok(GriddedVariable {
            bins: Some(BinAxis {
                dimension: request
                    .bin_dimension()
                    .unwrap_or_else(|| format!("{}_log_bin", request.variable)),
                edges,
            }),
            data: hist,
            attributes,
        })
    }
}

/// Per-bin counts of `values` over `edges`.
///
/// Counts values strictly below each edge, then takes the first difference.
/// The first bin is always zero; values outside `[edges[0], edges[last])`
/// and NaN never reach any bin.
fn cell_histogram(values: &[f64], edges: &[f64]) -> Vec<u32> {
    let cumulative: Vec<u32> = edges
        .iter()
        .map(|&e| values.iter().filter(|&&v| v < e).count() as u32)
        .collect();
    let mut bins = Vec::with_capacity(edges.len());
    bins.push(0);
    bins.extend(cumulative.windows(2).map(|w| w[1] - w[0]));
    bins.truncate(edges.len());
    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PointVariable;
    use std::path::PathBuf;

    fn scenario_grid() -> GridSpec {
        GridSpec {
            lat_min: -89.75,
            lat_max: 90.0,
            lon_min: -179.25,
            lon_max: 180.75,
            resolution: 0.5,
        }
    }

    fn flashes(points: &[(f64, f64, f64)]) -> FlashObservations {
        let mut variables = BTreeMap::new();
        variables.insert(
            "flash_energy".to_string(),
            PointVariable {
                dimension: "number_of_flashes".into(),
                values: points.iter().map(|p| p.2).collect(),
            },
        );
        FlashObservations {
            sources: vec![PathBuf::from("OR_GLM-L2-LCFA_G16_2018_156_19-20.nc")],
            dimension: "number_of_flashes".into(),
            latitude: points.iter().map(|p| p.0).collect(),
            longitude: points.iter().map(|p| p.1).collect(),
            variables,
            attributes: Attributes::new(),
        }
    }

    fn energy_bins() -> BinEdges {
        BinEdges::new(-16.0, -10.0, 0.25).unwrap()
    }

    fn index_of(axis: &[f64], value: f64) -> usize {
        axis.iter().position(|&c| (c - value).abs() < 1e-9).unwrap()
    }

    #[test]
    fn edges_include_max() {
        let edges = energy_bins().edges();
        assert_eq!(edges.len(), 25);
        assert_eq!(edges[0], -16.0);
        assert_eq!(*edges.last().unwrap(), -10.0);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = AggregateRequest::from_parts("flash_energy", "median", None).unwrap_err();
        assert!(matches!(err, RegridError::UnsupportedAggregation { ref name } if name == "median"));
    }

    #[test]
    fn histogram_without_bins_is_rejected() {
        let err = AggregateRequest::from_parts("flash_energy", "histogram", None).unwrap_err();
        assert!(matches!(err, RegridError::InvalidConfig(_)));
    }

    #[test]
    fn output_names() {
        let hist = AggregateRequest::from_parts("flash_area", "histogram", Some(energy_bins())).unwrap();
        assert_eq!(hist.output_name(), "flash_area_log_hist");
        assert_eq!(hist.bin_dimension().as_deref(), Some("flash_area_log_bin"));
        assert_eq!(AggregateRequest::count("flash").output_name(), "flash_count");
    }

    #[test]
    fn three_flash_scenario_counts() {
        let grid = scenario_grid();
        let obs = flashes(&[(12.3, -45.6, 1e-13), (12.4, -45.4, 2e-13), (50.0, 10.0, 5e-13)]);
        let snapped = SnappedFlashes::new(&grid, &obs);
        let out = snapped.aggregate(&AggregateRequest::count("flash")).unwrap();
        let counts = out.variable.count_view().unwrap();

        let lats = grid.latitudes();
        let lons = grid.longitudes();
        let y = index_of(&lats, 12.25);
        assert_eq!(counts[[0, y, index_of(&lons, -45.75)]], Some(1));
        assert_eq!(counts[[0, y, index_of(&lons, -45.25)]], Some(1));
        // 50.0 and 10.0 sit on midpoints and go to the lower centres.
        assert_eq!(counts[[0, index_of(&lats, 49.75), index_of(&lons, 9.75)]], Some(1));
        assert_eq!(counts.iter().filter(|c| c.is_some()).count(), 3);
        assert_eq!(counts.iter().flatten().sum::<u32>(), 3);
        assert_eq!(out.global_attributes["grid_resolution"], AttrValue::Double(0.5));
    }

    #[test]
    fn flashes_sharing_a_cell_are_counted_together() {
        let grid = scenario_grid();
        let obs = flashes(&[
            (12.3, -45.6, 1.5e-13),
            (12.1, -45.9, 2e-13),
            (12.45, -45.55, 2.5e-13),
            (12.26, -45.74, 5e-13),
            (50.0, 10.0, 5e-13),
        ]);
        let snapped = SnappedFlashes::new(&grid, &obs);
        assert_eq!(snapped.observed_cells(), 2);

        let y = index_of(&grid.latitudes(), 12.25);
        let x = index_of(&grid.longitudes(), -45.75);
        let counts = snapped.aggregate(&AggregateRequest::count("flash")).unwrap().variable;
        assert_eq!(counts.data[[0, 0, y, x]], Some(4));

        let request = AggregateRequest::log_histogram("flash_energy", energy_bins());
        let hist = snapped.aggregate(&request).unwrap().variable;
        let cell: Vec<u32> = (0..25).map(|b| hist.data[[0, b, y, x]].unwrap()).collect();
        // log10 values -12.82, -12.70, -12.60 and -12.30 fall below edges
        // -12.75, -12.5, -12.5 and -12.25.
        assert_eq!(cell[13], 1);
        assert_eq!(cell[14], 2);
        assert_eq!(cell[15], 1);
        assert_eq!(cell.iter().sum::<u32>(), 4);
    }

    #[test]
    fn histogram_counts_only_values_inside_edges() {
        let grid = scenario_grid();
        let obs = flashes(&[
            (12.3, -45.6, 1.5e-13),
            (12.3, -45.6, 2e-13),
            (12.3, -45.6, 5e-13),
            (12.3, -45.6, 1e-9),
            (12.3, -45.6, 1e-17),
            (12.3, -45.6, f64::NAN),
        ]);
        let snapped = SnappedFlashes::new(&grid, &obs);
        let request = AggregateRequest::log_histogram("flash_energy", energy_bins());
        let out = snapped.aggregate(&request).unwrap();
        assert_eq!(out.name, "flash_energy_log_hist");

        let y = index_of(&grid.latitudes(), 12.25);
        let x = index_of(&grid.longitudes(), -45.75);
        let cell: Vec<Option<u32>> = (0..25).map(|b| out.variable.data[[0, b, y, x]]).collect();
        assert_eq!(cell[0], Some(0));
        assert_eq!(cell.iter().flatten().sum::<u32>(), 3);
        assert!(cell.iter().all(Option::is_some));
    }

    #[test]
    fn unobserved_cells_are_none_not_zero() {
        let grid = scenario_grid();
        let obs = flashes(&[(50.0, 10.0, 5e-13)]);
        let snapped = SnappedFlashes::new(&grid, &obs);
        let request = AggregateRequest::log_histogram("flash_energy", energy_bins());
        let hist = snapped.aggregate(&request).unwrap().variable;
        let empty_cell = hist.data[[0, 3, 0, 0]];
        assert_eq!(empty_cell, None);
        assert_eq!(snapped.observed_cells(), 1);
    }

    #[test]
    fn histogram_of_absent_variable_needs_dimension() {
        let grid = scenario_grid();
        let obs = flashes(&[(50.0, 10.0, 5e-13)]);
        let snapped = SnappedFlashes::new(&grid, &obs);
        let request = AggregateRequest::log_histogram("flash_area", energy_bins());
        let err = snapped.aggregate(&request).unwrap_err();
        assert!(matches!(err, RegridError::MissingDimension { ref variable, .. } if variable == "flash_area"));
    }

    #[test]
    fn non_finite_coordinates_are_skipped() {
        let grid = scenario_grid();
        let obs = flashes(&[(f64::NAN, 10.0, 5e-13), (50.0, 10.0, 5e-13)]);
        let snapped = SnappedFlashes::new(&grid, &obs);
        assert_eq!(snapped.observed_cells(), 1);
    }

    #[test]
    fn cell_histogram_first_bin_is_zero() {
        let bins = cell_histogram(&[0.5, 1.5, 1.5, -3.0], &[0.0, 1.0, 2.0]);
        assert_eq!(bins, vec![0, 1, 2]);
    }
}
