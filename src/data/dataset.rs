//! Gridded datasets held in memory.

use super::attributes::{AttributeMerge, Attributes, MergeDiscipline};
use crate::error::{RegridError, Result};
use crate::grid::{ensure_same_axis, GridSpec};
use chrono::NaiveDateTime;
use ndarray::{concatenate, Array3, Array4, ArrayView4, Axis};
use std::collections::BTreeMap;

/// Dimension names used in gridded files.
pub const TIME_DIM: &str = "time";
/// Latitude dimension and coordinate.
pub const LATITUDE_DIM: &str = "latitude";
/// Longitude dimension and coordinate.
pub const LONGITUDE_DIM: &str = "longitude";

/// Histogram bin coordinate of a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct BinAxis {
    /// Dimension name, e.g. `flash_energy_log_bin`.
    pub dimension: String,
    /// Upper bin edges; bin `i` counts values in `[edges[i-1], edges[i])`.
    pub edges: Vec<f64>,
}

/// A per-cell count field, possibly histogrammed.
///
/// Data is laid out `(time, bin, latitude, longitude)`; plain counts have a
/// bin axis of length one. `None` marks a cell with no observations, which
/// is distinct from an observed zero.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedVariable {
    /// Histogram bins, `None` for plain counts.
    pub bins: Option<BinAxis>,
    /// Counts.
    pub data: Array4<Option<u32>>,
    /// Variable attributes.
    pub attributes: Attributes,
}

impl GriddedVariable {
    /// Plain count variable from a `(time, latitude, longitude)` array.
    pub fn counts(data: Array3<Option<u32>>, attributes: Attributes) -> Self {
        Self {
            bins: None,
            data: data.insert_axis(Axis(1)),
            attributes,
        }
    }

    /// The `(time, latitude, longitude)` view of a plain count variable.
    pub fn count_view(&self) -> Option<ndarray::ArrayView3<'_, Option<u32>>> {
        match self.bins {
            None => Some(self.data.index_axis(Axis(1), 0)),
            Some(_) => None,
        }
    }

    fn same_layout(&self, other: &GriddedVariable) -> bool {
        self.bins == other.bins && self.data.shape()[1..] == other.data.shape()[1..]
    }
}

/// Count fields on a regular grid over one or more hours.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedDataset {
    /// Time stamps, one per entry along the time axis.
    pub times: Vec<NaiveDateTime>,
    /// Latitude centres.
    pub latitudes: Vec<f64>,
    /// Longitude centres.
    pub longitudes: Vec<f64>,
    /// Variables by name.
    pub variables: BTreeMap<String, GriddedVariable>,
    /// Global attributes.
    pub attributes: Attributes,
}

impl GriddedDataset {
    /// Empty dataset shaped by `grid` with a single time stamp.
    pub fn empty(grid: &GridSpec, time: NaiveDateTime) -> Self {
        Self {
            times: vec![time],
            latitudes: grid.latitudes(),
            longitudes: grid.longitudes(),
            variables: BTreeMap::new(),
            attributes: Attributes::new(),
        }
    }

    /// `(time, latitude, longitude)` lengths.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.latitudes.len(), self.longitudes.len())
    }

    /// Add a variable, checking its shape against the dataset.
    pub fn insert(&mut self, name: impl Into<String>, variable: GriddedVariable) -> Result<()> {
        let name = name.into();
        let (nt, ny, nx) = self.shape();
        let shape = variable.data.shape();
        let nbins = variable.bins.as_ref().map_or(1, |b| b.edges.len());
        if shape != [nt, nbins, ny, nx] {
            return Err(RegridError::grid_mismatch(format!(
                "variable '{}' has shape {:?}, dataset expects {:?}",
                name,
                shape,
                [nt, nbins, ny, nx]
            )));
        }
        if self.variables.contains_key(&name) {
            return Err(RegridError::MergeConflict {
                attribute: name,
                existing: "variable".to_string(),
                incoming: "variable".to_string(),
            });
        }
        self.variables.insert(name, variable);
        Ok(())
    }

    /// Variable by name.
    pub fn variable(&self, name: &str) -> Option<&GriddedVariable> {
        self.variables.get(name)
    }

    /// Fails unless both datasets share latitude and longitude centres.
    pub fn ensure_same_grid(&self, other: &GriddedDataset) -> Result<()> {
        ensure_same_axis("latitude", &self.latitudes, &other.latitudes)?;
        ensure_same_axis("longitude", &self.longitudes, &other.longitudes)
    }

    /// Join datasets along time, ordered by time stamp.
    ///
    /// All parts must share the grid, variable names and bin axes. Global
    /// attributes are merged under `discipline`.
    pub fn concat(mut parts: Vec<GriddedDataset>, discipline: MergeDiscipline) -> Result<Self> {
        parts.sort_by_key(|p| p.times.first().copied());
        let first = parts
            .first()
            .ok_or_else(|| RegridError::grid_mismatch("nothing to concatenate"))?;

        let mut merge = AttributeMerge::new(discipline);
        for part in &parts {
            first.ensure_same_grid(part)?;
            if part.variables.keys().ne(first.variables.keys()) {
                return Err(RegridError::grid_mismatch(format!(
                    "variables {:?} differ from {:?}",
                    part.variables.keys().collect::<Vec<_>>(),
                    first.variables.keys().collect::<Vec<_>>()
                )));
            }
            for (name, var) in &part.variables {
                if !first.variables[name].same_layout(var) {
                    return Err(RegridError::grid_mismatch(format!(
                        "variable '{}' has different bins",
                        name
                    )));
                }
            }
            merge.add(&part.attributes)?;
        }

        let mut variables = BTreeMap::new();
        for (name, template) in &first.variables {
            let views: Vec<ArrayView4<'_, Option<u32>>> =
                parts.iter().map(|p| p.variables[name].data.view()).collect();
            let data = concatenate(Axis(0), &views)
                .map_err(|e| RegridError::grid_mismatch(e.to_string()))?;
            let mut var_merge = AttributeMerge::new(discipline);
            for part in &parts {
                var_merge.add(&part.variables[name].attributes)?;
            }
            variables.insert(
                name.clone(),
                GriddedVariable {
                    bins: template.bins.clone(),
                    data,
                    attributes: var_merge.finish(),
                },
            );
        }

        Ok(Self {
            times: parts.iter().flat_map(|p| p.times.iter().copied()).collect(),
            latitudes: first.latitudes.clone(),
            longitudes: first.longitudes.clone(),
            variables,
            attributes: merge.finish(),
        })
    }
}
