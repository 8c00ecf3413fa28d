//! Lightning exposure of a transport-model field.
//!
//! The model field is weighted by the hourly flash count of each cell and
//! summed over the grid: `sum(model * flash_count) / 3600`.

use crate::data::{
    atomic_write, put_coordinate, put_counts, put_global_attributes, put_time, AttrValue,
    Attributes, GriddedDataset, ModelField, COUNT_FILL_VALUE, LATITUDE_DIM, LONGITUDE_DIM,
    TIME_DIM,
};
use crate::error::{RegridError, Result};
use crate::grid::ensure_same_axis;
use chrono::NaiveDateTime;
use ndarray::{Array3, ArrayD, Axis, IxDyn};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Name of the derived variable.
pub const EXPOSURE_VARIABLE: &str = "lightning_exposure";

/// Seconds per hour; flash counts are hourly accumulations.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Model field and flash counts joined on time, with the derived exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonDataset {
    /// Time stamps present in both inputs.
    pub times: Vec<NaiveDateTime>,
    /// Latitude centres shared by both inputs.
    pub latitudes: Vec<f64>,
    /// Longitude centres shared by both inputs.
    pub longitudes: Vec<f64>,
    /// Name of the flash count variable.
    pub count_variable: String,
    /// Flash counts at the joined times, `(time, latitude, longitude)`.
    pub flash_count: Array3<Option<u32>>,
    /// Dimensions of `exposure`: `time` followed by the model's
    /// non-spatial dimensions.
    pub exposure_dimensions: Vec<String>,
    /// `sum(model * flash_count) / 3600` over latitude and longitude.
    pub exposure: ArrayD<f64>,
    /// Name of the model field the exposure was computed from.
    pub model_variable: String,
    /// Global attributes of the satellite series.
    pub attributes: Attributes,
}

impl ComparisonDataset {
    /// Write the joined dataset to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        atomic_write(path, |file| {
            put_time(file, &self.times)?;
            put_coordinate(file, LATITUDE_DIM, &self.latitudes, "degrees_north")?;
            put_coordinate(file, LONGITUDE_DIM, &self.longitudes, "degrees_east")?;
            for (name, len) in self.exposure_dimensions.iter().zip(self.exposure.shape()).skip(1) {
                file.add_dimension(name, *len)?;
            }

            let counts: Vec<i32> = self
                .flash_count
                .iter()
                .map(|c| c.map_or(COUNT_FILL_VALUE, |v| v as i32))
                .collect();
            let count_attrs: Attributes = [("units".to_string(), AttrValue::from("1"))]
                .into_iter()
                .collect();
            put_counts(
                file,
                &self.count_variable,
                &[TIME_DIM, LATITUDE_DIM, LONGITUDE_DIM],
                &counts,
                &count_attrs,
                false,
            )?;

            let dims: Vec<&str> = self.exposure_dimensions.iter().map(String::as_str).collect();
            {
                let mut var = file.add_variable::<f64>(EXPOSURE_VARIABLE, &dims)?;
                var.put_attribute(
                    "long_name",
                    format!("flash-count weighted sum of {} per second", self.model_variable),
                )?;
                var.put_attribute("source_variable", self.model_variable.as_str())?;
                let values: Vec<f64> = self.exposure.iter().copied().collect();
                var.put_values(&values, ..)?;
            }

            put_global_attributes(file, &self.attributes)
        })?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Join `model` with the flash counts of `satellite` and compute the
/// lightning exposure.
///
/// Both must share latitude and longitude centres. Only time stamps found
/// in both are kept. Cells without observations and NaN model values add
/// nothing to the sum.
pub fn compare(
    model: &ModelField,
    satellite: &GriddedDataset,
    count_variable: &str,
) -> Result<ComparisonDataset> {
    ensure_same_axis(LATITUDE_DIM, &satellite.latitudes, &model.latitudes)?;
    ensure_same_axis(LONGITUDE_DIM, &satellite.longitudes, &model.longitudes)?;
    let counts = satellite
        .variable(count_variable)
        .and_then(|v| v.count_view())
        .ok_or_else(|| RegridError::missing_variable(count_variable, "assembled satellite series"))?;

    let axis = |dim: &str| {
        model
            .axis(dim)
            .ok_or_else(|| RegridError::missing_dimension(&model.name, dim))
    };
    let (t_axis, y_axis, x_axis) = (axis(TIME_DIM)?, axis(LATITUDE_DIM)?, axis(LONGITUDE_DIM)?);
    let other_axes: Vec<usize> = (0..model.dimensions.len())
        .filter(|a| ![t_axis, y_axis, x_axis].contains(a))
        .collect();

    let satellite_index: HashMap<NaiveDateTime, usize> = satellite
        .times
        .iter()
        .enumerate()
        .map(|(i, &t)| (t, i))
        .collect();
    let joined: Vec<(usize, usize)> = model
        .times
        .iter()
        .enumerate()
        .filter_map(|(ti, t)| satellite_index.get(t).map(|&si| (ti, si)))
        .collect();
    info!(
        "{} of {} model time steps have satellite data",
        joined.len(),
        model.times.len()
    );

    let mut order = vec![t_axis];
    order.extend(&other_axes);
    order.extend([y_axis, x_axis]);
    let field = model.data.view().permuted_axes(IxDyn(&order));

    let other_shape: Vec<usize> = other_axes.iter().map(|&a| model.data.shape()[a]).collect();
    let n_other: usize = other_shape.iter().product();
    let (ny, nx) = (satellite.latitudes.len(), satellite.longitudes.len());

    let mut exposure = Vec::with_capacity(joined.len() * n_other);
    let mut flash_count = Array3::from_elem((joined.len(), ny, nx), None);
    for (k, &(ti, si)) in joined.iter().enumerate() {
        let hour_counts = counts.index_axis(Axis(0), si);
        flash_count.index_axis_mut(Axis(0), k).assign(&hour_counts);

        let values: Vec<f64> = field.index_axis(Axis(0), ti).iter().copied().collect();
        for cells in values.chunks((ny * nx).max(1)) {
            let total: f64 = cells
                .iter()
                .zip(hour_counts.iter())
                .filter_map(|(&m, &c)| match c {
                    Some(c) if !m.is_nan() => Some(m * f64::from(c)),
                    _ => None,
                })
                .sum();
            exposure.push(total / SECONDS_PER_HOUR);
        }
    }

    let mut shape = vec![joined.len()];
    shape.extend(&other_shape);
    let exposure = ArrayD::from_shape_vec(IxDyn(&shape), exposure)
        .map_err(|e| RegridError::grid_mismatch(e.to_string()))?;

    let mut exposure_dimensions = vec![TIME_DIM.to_string()];
    exposure_dimensions.extend(other_axes.iter().map(|&a| model.dimensions[a].clone()));

    Ok(ComparisonDataset {
        times: joined.iter().map(|&(ti, _)| model.times[ti]).collect(),
        latitudes: satellite.latitudes.clone(),
        longitudes: satellite.longitudes.clone(),
        count_variable: count_variable.to_string(),
        flash_count,
        exposure_dimensions,
        exposure,
        model_variable: model.name.clone(),
        attributes: satellite.attributes.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GriddedVariable;
    use crate::grid::GridSpec;
    use chrono::NaiveDate;

    fn grid() -> GridSpec {
        GridSpec {
            lat_min: 10.25,
            lat_max: 11.0,
            lon_min: 20.25,
            lon_max: 21.0,
            resolution: 0.5,
        }
    }

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 6, 5)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    /// Two hours on a 2x2 grid; hour 19 has flashes in two cells.
    fn satellite() -> GriddedDataset {
        let mut ds = GriddedDataset::empty(&grid(), hour(19));
        ds.times.push(hour(20));
        let mut counts = Array3::from_elem((2, 2, 2), None);
        counts[[0, 0, 0]] = Some(2);
        counts[[0, 1, 1]] = Some(1);
        counts[[1, 0, 1]] = Some(4);
        ds.insert("flash_count", GriddedVariable::counts(counts, Attributes::new()))
            .unwrap();
        ds
    }

    /// Field `(time, height, latitude, longitude)` with times 18 and 19.
    fn model() -> ModelField {
        let g = grid();
        let mut data = ArrayD::from_elem(IxDyn(&[2, 2, 2, 2]), 3600.0);
        data[[1, 1, 0, 0]] = 7200.0;
        data[[1, 0, 1, 1]] = f64::NAN;
        ModelField {
            name: "spec001_mr".to_string(),
            dimensions: ["time", "height", "latitude", "longitude"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            data,
            times: vec![hour(18), hour(19)],
            latitudes: g.latitudes(),
            longitudes: g.longitudes(),
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn exposure_weights_model_by_counts() {
        let result = compare(&model(), &satellite(), "flash_count").unwrap();
        assert_eq!(result.times, vec![hour(19)]);
        assert_eq!(result.exposure_dimensions, vec!["time", "height"]);
        assert_eq!(result.exposure.shape(), &[1, 2]);
        // height 0: 2 * 1 + NaN cell skipped
        assert!((result.exposure[[0, 0]] - 2.0).abs() < 1e-12);
        // height 1: 2 * 2 + 1 * 1
        assert!((result.exposure[[0, 1]] - 5.0).abs() < 1e-12);
        assert_eq!(result.flash_count[[0, 0, 0]], Some(2));
        assert_eq!(result.flash_count[[0, 1, 0]], None);
    }

    #[test]
    fn dimension_order_does_not_matter() {
        let mut m = model();
        m.data = m.data.permuted_axes(IxDyn(&[2, 3, 0, 1])).as_standard_layout().to_owned();
        m.dimensions = ["latitude", "longitude", "time", "height"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let result = compare(&m, &satellite(), "flash_count").unwrap();
        assert!((result.exposure[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((result.exposure[[0, 1]] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let mut m = model();
        m.longitudes = vec![20.0, 20.5];
        let err = compare(&m, &satellite(), "flash_count").unwrap_err();
        assert!(matches!(err, RegridError::GridMismatch(_)));
    }

    #[test]
    fn missing_count_variable_is_reported() {
        let err = compare(&model(), &satellite(), "group_count").unwrap_err();
        assert!(matches!(err, RegridError::MissingVariable { .. }));
    }

    #[test]
    fn writes_netcdf() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("exposure.nc");
        let result = compare(&model(), &satellite(), "flash_count").unwrap();
        result.write(&path).unwrap();

        let file = netcdf::open(&path).unwrap();
        let var = file.variable(EXPOSURE_VARIABLE).unwrap();
        let values: Vec<f64> = var.get_values(..).unwrap();
        assert_eq!(values.len(), 2);
        assert!(file.variable("flash_count").is_some());
    }
}
