//! NetCDF file writer.
//!
//! Files are written to a temporary name in the destination directory and
//! renamed into place, so a reader never sees a half-written file.

use super::attributes::Attributes;
use super::dataset::{GriddedDataset, LATITUDE_DIM, LONGITUDE_DIM, TIME_DIM};
use super::time::{TimeUnits, NANOSECONDS_SINCE_EPOCH};
use super::variable_data::COUNT_FILL_VALUE;
use crate::error::{RegridError, Result};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::debug;

const HISTOGRAM_DEFLATE_LEVEL: i32 = 4;

/// NetCDF data writer.
#[derive(Debug)]
pub struct DataWriter;

impl DataWriter {
    /// Write a gridded dataset to `path`, replacing any existing file.
    pub fn write_gridded(dataset: &GriddedDataset, path: &Path) -> Result<()> {
        atomic_write(path, |file| {
            put_time(file, &dataset.times)?;
            put_coordinate(file, LATITUDE_DIM, &dataset.latitudes, "degrees_north")?;
            put_coordinate(file, LONGITUDE_DIM, &dataset.longitudes, "degrees_east")?;

            for (name, variable) in &dataset.variables {
                let mut dims = vec![TIME_DIM];
                let mut compress = false;
                if let Some(bins) = &variable.bins {
                    if file.dimension(&bins.dimension).is_none() {
                        put_coordinate(file, &bins.dimension, &bins.edges, "1")?;
                    }
                    dims.push(&bins.dimension);
                    compress = true;
                }
                dims.extend([LATITUDE_DIM, LONGITUDE_DIM]);

                let values: Vec<i32> = variable
                    .data
                    .iter()
                    .map(|c| c.map_or(COUNT_FILL_VALUE, |v| v as i32))
                    .collect();
                put_counts(file, name, &dims, &values, &variable.attributes, compress)?;
            }

            put_global_attributes(file, &dataset.attributes)
        })?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Create `path` through a temporary file in the same directory.
pub(crate) fn atomic_write<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut netcdf::FileMut) -> Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".nc.tmp")
        .tempfile_in(dir)?;

    {
        let mut file = netcdf::create(tmp.path())?;
        write(&mut file)?;
    }

    tmp.persist(path).map_err(|e| RegridError::Io(e.error))?;
    Ok(())
}

/// Add the `time` dimension and coordinate in nanoseconds since the epoch.
pub(crate) fn put_time(file: &mut netcdf::FileMut, times: &[NaiveDateTime]) -> Result<()> {
    let units = TimeUnits::nanoseconds_since_epoch();
    let values: Vec<f64> = times.iter().map(|&t| units.encode(t)).collect();

    file.add_dimension(TIME_DIM, times.len())?;
    let mut var = file.add_variable::<f64>(TIME_DIM, &[TIME_DIM])?;
    var.put_attribute("standard_name", "time")?;
    var.put_attribute("units", NANOSECONDS_SINCE_EPOCH)?;
    var.put_attribute("calendar", "proleptic_gregorian")?;
    var.put_values(&values, ..)?;
    Ok(())
}

/// Add a dimension with a coordinate variable of the same name.
pub(crate) fn put_coordinate(
    file: &mut netcdf::FileMut,
    name: &str,
    values: &[f64],
    units: &str,
) -> Result<()> {
    file.add_dimension(name, values.len())?;
    let mut var = file.add_variable::<f64>(name, &[name])?;
    var.put_attribute("units", units)?;
    var.put_values(values, ..)?;
    Ok(())
}

/// Add an integer count variable whose missing cells hold the fill value.
pub(crate) fn put_counts(
    file: &mut netcdf::FileMut,
    name: &str,
    dims: &[&str],
    values: &[i32],
    attributes: &Attributes,
    compress: bool,
) -> Result<()> {
    let mut var = file.add_variable::<i32>(name, dims)?;
    var.set_fill_value(COUNT_FILL_VALUE)?;
    if compress {
        var.set_compression(HISTOGRAM_DEFLATE_LEVEL, true)?;
    }
    for (key, value) in attributes {
        var.put_attribute(key, netcdf::AttributeValue::from(value))?;
    }
    var.put_values(values, ..)?;
    Ok(())
}

/// Add global attributes.
pub(crate) fn put_global_attributes(file: &mut netcdf::FileMut, attributes: &Attributes) -> Result<()> {
    for (key, value) in attributes {
        file.add_attribute(key, netcdf::AttributeValue::from(value))?;
    }
    Ok(())
}
