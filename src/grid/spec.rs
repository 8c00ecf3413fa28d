//! Regular latitude/longitude grid definition.

use crate::error::{RegridError, Result};
use serde::Deserialize;

const COORD_TOLERANCE: f64 = 1e-9;

/// A regular grid of cell centres.
///
/// Centres along an axis are `min + i * resolution` for every `i` with
/// `min + i * resolution < max`, so the same five numbers always produce the
/// same centres. Producer and consumer grids are compared by their centres.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GridSpec {
    /// First latitude centre.
    pub lat_min: f64,
    /// Exclusive upper bound for latitude centres.
    pub lat_max: f64,
    /// First longitude centre.
    pub lon_min: f64,
    /// Exclusive upper bound for longitude centres.
    pub lon_max: f64,
    /// Spacing between centres in degrees.
    pub resolution: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            lat_min: -89.75,
            lat_max: 90.0,
            lon_min: -179.75,
            lon_max: 180.0,
            resolution: 0.5,
        }
    }
}

impl GridSpec {
    /// Checks the grid is non-empty and within geographic limits.
    pub fn check_bounds(&self) -> Result<()> {
        if !(self.resolution > 0.0) {
            return Err(RegridError::InvalidConfig(
                "Grid resolution must be positive".to_string(),
            ));
        }
        if !(self.lat_min < self.lat_max) || !(self.lon_min < self.lon_max) {
            return Err(RegridError::InvalidConfig(
                "Grid minimum must be below grid maximum".to_string(),
            ));
        }
        if self.lat_min < -90.0 || self.lat_max > 90.0 + self.resolution {
            return Err(RegridError::InvalidConfig(
                "Grid latitudes must lie within [-90, 90]".to_string(),
            ));
        }
        Ok(())
    }

    /// Latitude cell centres, ascending.
    pub fn latitudes(&self) -> Vec<f64> {
        centres(self.lat_min, self.lat_max, self.resolution)
    }

    /// Longitude cell centres, ascending.
    pub fn longitudes(&self) -> Vec<f64> {
        centres(self.lon_min, self.lon_max, self.resolution)
    }

    /// `(latitude count, longitude count)`.
    pub fn shape(&self) -> (usize, usize) {
        (
            axis_len(self.lat_min, self.lat_max, self.resolution),
            axis_len(self.lon_min, self.lon_max, self.resolution),
        )
    }

    /// Index of the latitude centre nearest to `lat`.
    pub fn snap_latitude(&self, lat: f64) -> Option<usize> {
        nearest(&self.latitudes(), lat)
    }

    /// Index of the longitude centre nearest to `lon`.
    pub fn snap_longitude(&self, lon: f64) -> Option<usize> {
        nearest(&self.longitudes(), lon)
    }

    /// Fails unless `latitudes`/`longitudes` are this grid's centres.
    pub fn ensure_matches(&self, latitudes: &[f64], longitudes: &[f64]) -> Result<()> {
        ensure_same_axis("latitude", &self.latitudes(), latitudes)?;
        ensure_same_axis("longitude", &self.longitudes(), longitudes)
    }
}

/// Fails unless two coordinate axes agree element-wise.
pub fn ensure_same_axis(name: &str, expected: &[f64], actual: &[f64]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(RegridError::grid_mismatch(format!(
            "{} has {} points, expected {}",
            name,
            actual.len(),
            expected.len()
        )));
    }
    if let Some((i, (e, a))) = expected
        .iter()
        .zip(actual)
        .enumerate()
        .find(|(_, (e, a))| (*e - *a).abs() > COORD_TOLERANCE)
    {
        return Err(RegridError::grid_mismatch(format!(
            "{}[{}] is {}, expected {}",
            name, i, a, e
        )));
    }
    Ok(())
}

fn axis_len(min: f64, max: f64, step: f64) -> usize {
    ((max - min) / step - COORD_TOLERANCE).ceil().max(0.0) as usize
}

fn centres(min: f64, max: f64, step: f64) -> Vec<f64> {
    (0..axis_len(min, max, step))
        .map(|i| min + i as f64 * step)
        .collect()
}

/// Nearest element of an ascending axis; on an exact midpoint the lower
/// value wins. Values beyond either end snap to that end.
pub(crate) fn nearest(axis: &[f64], x: f64) -> Option<usize> {
    if axis.is_empty() || !x.is_finite() {
        return None;
    }
    let upper = axis.partition_point(|&c| c < x);
    if upper == 0 {
        return Some(0);
    }
    if upper == axis.len() {
        return Some(axis.len() - 1);
    }
    let lower = upper - 1;
    if x - axis[lower] <= axis[upper] - x {
        Some(lower)
    } else {
        Some(upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_grid() -> GridSpec {
        GridSpec {
            lat_min: -89.75,
            lat_max: 90.0,
            lon_min: -179.25,
            lon_max: 180.75,
            resolution: 0.5,
        }
    }

    #[test]
    fn centres_follow_half_open_range() {
        let grid = scenario_grid();
        let lats = grid.latitudes();
        assert_eq!(lats.len(), 360);
        assert_eq!(lats[0], -89.75);
        assert!((lats[359] - 89.75).abs() < 1e-12);

        let lons = grid.longitudes();
        assert_eq!(lons.len(), 720);
        assert!((lons[719] - 180.25).abs() < 1e-12);
        assert_eq!(grid.shape(), (360, 720));
    }

    #[test]
    fn centres_are_stable_across_calls() {
        let grid = GridSpec::default();
        assert_eq!(grid.latitudes(), grid.latitudes());
        assert!(grid.ensure_matches(&grid.latitudes(), &grid.longitudes()).is_ok());
    }

    #[test]
    fn snaps_to_nearest_centre() {
        let grid = scenario_grid();
        let lats = grid.latitudes();
        let lons = grid.longitudes();
        assert_eq!(lats[grid.snap_latitude(12.3).unwrap()], 12.25);
        assert_eq!(lats[grid.snap_latitude(12.6).unwrap()], 12.75);
        assert_eq!(lons[grid.snap_longitude(-45.6).unwrap()], -45.75);
        assert_eq!(lons[grid.snap_longitude(-45.4).unwrap()], -45.25);
    }

    #[test]
    fn midpoint_goes_to_lower_centre() {
        let axis = [0.25, 0.75, 1.25];
        assert_eq!(nearest(&axis, 0.5), Some(0));
        assert_eq!(nearest(&axis, 1.0), Some(1));
    }

    #[test]
    fn out_of_range_snaps_to_edges_and_nan_is_dropped() {
        let axis = [0.25, 0.75, 1.25];
        assert_eq!(nearest(&axis, -10.0), Some(0));
        assert_eq!(nearest(&axis, 10.0), Some(2));
        assert_eq!(nearest(&axis, f64::NAN), None);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let a = GridSpec::default();
        let b = scenario_grid();
        let err = a.ensure_matches(&b.latitudes(), &b.longitudes()).unwrap_err();
        assert!(matches!(err, RegridError::GridMismatch(_)));
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let grid = GridSpec {
            resolution: 0.0,
            ..GridSpec::default()
        };
        assert!(grid.check_bounds().is_err());
    }
}
