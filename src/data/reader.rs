//! NetCDF file reader.

use super::attributes::{AttrValue, Attributes};
use super::dataset::{BinAxis, GriddedDataset, GriddedVariable, LATITUDE_DIM, LONGITUDE_DIM, TIME_DIM};
use super::observations::{FlashObservations, PointVariable, FLASH_LATITUDE, FLASH_LONGITUDE};
use super::time::TimeUnits;
use super::variable_data::{read_counts, read_numeric};
use crate::error::{RegridError, Result};
use chrono::NaiveDateTime;
use ndarray::{ArrayD, Axis, Ix4};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Transport-model output on a lat/lon grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelField {
    /// Name of the field in the model file.
    pub name: String,
    /// Dimension names, in the order of `data`'s axes.
    pub dimensions: Vec<String>,
    /// Field values.
    pub data: ArrayD<f64>,
    /// Time stamps along the `time` dimension.
    pub times: Vec<NaiveDateTime>,
    /// Latitude centres.
    pub latitudes: Vec<f64>,
    /// Longitude centres.
    pub longitudes: Vec<f64>,
    /// Variable attributes.
    pub attributes: Attributes,
}

impl ModelField {
    /// Axis index of a named dimension.
    pub fn axis(&self, dimension: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d == dimension)
    }
}

/// NetCDF data reader.
#[derive(Debug)]
pub struct DataReader;

impl DataReader {
    /// Read flash locations and the requested per-flash variables.
    ///
    /// Requested variables absent from the file are left out; aggregations
    /// over them report the problem.
    pub fn read_observations(path: &Path, variables: &[&str]) -> Result<FlashObservations> {
        let file = open(path)?;

        let lat_var = file
            .variable(FLASH_LATITUDE)
            .ok_or_else(|| RegridError::missing_variable(FLASH_LATITUDE, path))?;
        let lon_var = file
            .variable(FLASH_LONGITUDE)
            .ok_or_else(|| RegridError::missing_variable(FLASH_LONGITUDE, path))?;
        let dimension = lat_var
            .dimensions()
            .first()
            .map(|d| d.name().to_string())
            .unwrap_or_default();

        let latitude = read_numeric(&lat_var)?.into_raw_vec_and_offset().0;
        let longitude = read_numeric(&lon_var)?.into_raw_vec_and_offset().0;
        if latitude.len() != longitude.len() {
            return Err(RegridError::NetCDF(format!(
                "{} and {} differ in length in {}",
                FLASH_LATITUDE,
                FLASH_LONGITUDE,
                path.display()
            )));
        }

        let mut point_vars = BTreeMap::new();
        for name in variables {
            let Some(var) = file.variable(name) else {
                debug!("{} has no variable '{}'", path.display(), name);
                continue;
            };
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
            point_vars.insert(
                name.to_string(),
                PointVariable {
                    dimension: dims.join(","),
                    values: read_numeric(&var)?.into_raw_vec_and_offset().0,
                },
            );
        }

        debug!("Read {} flashes from {}", latitude.len(), path.display());
        Ok(FlashObservations {
            sources: vec![path.to_path_buf()],
            dimension,
            latitude,
            longitude,
            variables: point_vars,
            attributes: global_attributes(&file),
        })
    }

    /// Read a gridded file written by [`DataWriter::write_gridded`](super::DataWriter::write_gridded).
    pub fn read_gridded(path: &Path) -> Result<GriddedDataset> {
        let file = open(path)?;
        let times = read_times(&file, path)?;
        let latitudes = read_coordinate(&file, LATITUDE_DIM, path)?;
        let longitudes = read_coordinate(&file, LONGITUDE_DIM, path)?;

        let mut variables = BTreeMap::new();
        for var in file.variables() {
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
            let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
            let bins = match dims.as_slice() {
                [TIME_DIM, LATITUDE_DIM, LONGITUDE_DIM] => None,
                [TIME_DIM, bin, LATITUDE_DIM, LONGITUDE_DIM] => Some(BinAxis {
                    dimension: bin.to_string(),
                    edges: read_coordinate(&file, bin, path)?,
                }),
                _ => continue,
            };

            let counts = read_counts(&var)?;
            let data = match bins {
                None => counts.insert_axis(Axis(1)),
                Some(_) => counts,
            }
            .into_dimensionality::<Ix4>()
            .map_err(|e| RegridError::NetCDF(format!("{}: {}", var.name(), e)))?;

            variables.insert(
                var.name().to_string(),
                GriddedVariable {
                    bins,
                    data,
                    attributes: variable_attributes(&var),
                },
            );
        }

        Ok(GriddedDataset {
            times,
            latitudes,
            longitudes,
            variables,
            attributes: global_attributes(&file),
        })
    }

    /// Read one field of a transport-model (FLEXPART) output file.
    ///
    /// The field must span `time`, `latitude` and `longitude`; any other
    /// dimensions (release point, height, age class) are kept as they are.
    pub fn read_model_field(path: &Path, variable: &str) -> Result<ModelField> {
        let file = open(path)?;
        let var = file
            .variable(variable)
            .ok_or_else(|| RegridError::missing_variable(variable, path))?;
        let dimensions: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
        for required in [TIME_DIM, LATITUDE_DIM, LONGITUDE_DIM] {
            if !dimensions.iter().any(|d| d == required) {
                return Err(RegridError::missing_dimension(variable, required));
            }
        }

        Ok(ModelField {
            name: variable.to_string(),
            data: read_numeric(&var)?,
            dimensions,
            times: read_times(&file, path)?,
            latitudes: read_coordinate(&file, LATITUDE_DIM, path)?,
            longitudes: read_coordinate(&file, LONGITUDE_DIM, path)?,
            attributes: variable_attributes(&var),
        })
    }
}

fn open(path: &Path) -> Result<netcdf::File> {
    if !path.exists() {
        return Err(RegridError::FileOpen {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    netcdf::open(path)
        .map_err(|e| RegridError::NetCDF(format!("Failed to open {}: {}", path.display(), e)))
}

fn read_coordinate(file: &netcdf::File, name: &str, path: &Path) -> Result<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| RegridError::missing_variable(name, path))?;
    Ok(read_numeric(&var)?.into_raw_vec_and_offset().0)
}

fn read_times(file: &netcdf::File, path: &Path) -> Result<Vec<NaiveDateTime>> {
    let var = file
        .variable(TIME_DIM)
        .ok_or_else(|| RegridError::missing_variable(TIME_DIM, path))?;
    let units = var
        .attribute("units")
        .and_then(|a| a.value().ok())
        .map(AttrValue::from)
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| RegridError::NetCDF(format!("time in {} has no units", path.display())))?;
    let units = TimeUnits::parse(&units)?;
    Ok(read_numeric(&var)?.iter().map(|&v| units.decode(v)).collect())
}

fn global_attributes(file: &netcdf::File) -> Attributes {
    file.attributes()
        .filter_map(|attr| {
            let value = attr.value().ok()?;
            Some((attr.name().to_string(), AttrValue::from(value)))
        })
        .collect()
}

fn variable_attributes(var: &netcdf::Variable<'_>) -> Attributes {
    var.attributes()
        .filter(|attr| attr.name() != "_FillValue")
        .filter_map(|attr| {
            let value = attr.value().ok()?;
            Some((attr.name().to_string(), AttrValue::from(value)))
        })
        .collect()
}
