//! Typed reads of NetCDF variables.

use super::attributes::AttrValue;
use crate::error::{RegridError, Result};
use ndarray::{ArrayD, IxDyn};
use netcdf::types::{FloatType, IntType, NcVariableType};

/// Fill value written for cells without observations.
pub const COUNT_FILL_VALUE: i32 = -2_147_483_647;

/// Read a numeric variable as `f64`, applying CF packing conventions.
///
/// `_FillValue` and `missing_value` become NaN, `_Unsigned = "true"`
/// reinterprets signed storage, then `scale_factor` and `add_offset` are
/// applied.
pub fn read_numeric(var: &netcdf::Variable<'_>) -> Result<ArrayD<f64>> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let attr = |name: &str| {
        var.attribute(name)
            .and_then(|a| a.value().ok())
            .map(AttrValue::from)
    };
    let unsigned = attr("_Unsigned")
        .and_then(|v| v.as_str().map(|s| s.eq_ignore_ascii_case("true")))
        .unwrap_or(false);
    let fills: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| attr(name).and_then(|v| v.as_f64()))
        .collect();
    let scale_factor = attr("scale_factor").and_then(|v| v.as_f64()).unwrap_or(1.0);
    let add_offset = attr("add_offset").and_then(|v| v.as_f64()).unwrap_or(0.0);

    let mut data = read_variable_array(var, &shape, unsigned)?;
    let raw_fills: Vec<f64> = fills
        .iter()
        .map(|&f| if unsigned { reinterpret_unsigned(var, f) } else { f })
        .collect();

    data.mapv_inplace(|v| {
        if raw_fills.iter().any(|&f| f == v) {
            f64::NAN
        } else {
            v * scale_factor + add_offset
        }
    });
    Ok(data)
}

/// Read an integer count variable, mapping the fill value to `None`.
pub fn read_counts(var: &netcdf::Variable<'_>) -> Result<ArrayD<Option<u32>>> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let fill = var
        .attribute("_FillValue")
        .and_then(|a| a.value().ok())
        .and_then(|v| AttrValue::from(v).as_f64())
        .map(|f| f as i32)
        .unwrap_or(COUNT_FILL_VALUE);
    let values: Vec<i32> = var.get_values(..)?;
    let counts = values
        .into_iter()
        .map(|v| if v == fill || v < 0 { None } else { Some(v as u32) })
        .collect();
    ArrayD::from_shape_vec(IxDyn(&shape), counts)
        .map_err(|e| RegridError::NetCDF(format!("Invalid shape/data size: {}", e)))
}

fn reinterpret_unsigned(var: &netcdf::Variable<'_>, value: f64) -> f64 {
    match var.vartype() {
        NcVariableType::Int(IntType::I8) if value < 0.0 => value + 256.0,
        NcVariableType::Int(IntType::I16) if value < 0.0 => value + 65_536.0,
        NcVariableType::Int(IntType::I32) if value < 0.0 => value + 4_294_967_296.0,
        _ => value,
    }
}

fn read_variable_array(
    var: &netcdf::Variable<'_>,
    shape: &[usize],
    unsigned: bool,
) -> Result<ArrayD<f64>> {
    let vartype = var.vartype();

    // Helper to build ArrayD<f64> from a Vec<f64> and the known shape
    let from_vec = |v: Vec<f64>| -> Result<ArrayD<f64>> {
        ArrayD::from_shape_vec(IxDyn(shape), v)
            .map_err(|e| RegridError::NetCDF(format!("Invalid shape/data size: {}", e)))
    };
    let read_err = |e: netcdf::Error| {
        RegridError::NetCDF(format!("Failed to read '{}': {}", var.name(), e))
    };

    match vartype {
        NcVariableType::Float(FloatType::F64) => {
            let values: Vec<f64> = var.get_values(..).map_err(read_err)?;
            from_vec(values)
        }
        NcVariableType::Float(FloatType::F32) => {
            let values: Vec<f32> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(f64::from).collect())
        }
        NcVariableType::Int(IntType::I64) => {
            let values: Vec<i64> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(|x| x as f64).collect())
        }
        NcVariableType::Int(IntType::I32) if unsigned => {
            let values: Vec<i32> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(|x| f64::from(x as u32)).collect())
        }
        NcVariableType::Int(IntType::I32) => {
            let values: Vec<i32> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(f64::from).collect())
        }
        NcVariableType::Int(IntType::I16) if unsigned => {
            let values: Vec<i16> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(|x| f64::from(x as u16)).collect())
        }
        NcVariableType::Int(IntType::I16) => {
            let values: Vec<i16> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(f64::from).collect())
        }
        NcVariableType::Int(IntType::I8) if unsigned => {
            let values: Vec<i8> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(|x| f64::from(x as u8)).collect())
        }
        NcVariableType::Int(IntType::I8) => {
            let values: Vec<i8> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(f64::from).collect())
        }
        NcVariableType::Int(IntType::U64) => {
            let values: Vec<u64> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(|x| x as f64).collect())
        }
        NcVariableType::Int(IntType::U32) => {
            let values: Vec<u32> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(f64::from).collect())
        }
        NcVariableType::Int(IntType::U16) => {
            let values: Vec<u16> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(f64::from).collect())
        }
        NcVariableType::Int(IntType::U8) => {
            let values: Vec<u8> = var.get_values(..).map_err(read_err)?;
            from_vec(values.into_iter().map(f64::from).collect())
        }
        NcVariableType::Char | NcVariableType::String => Err(RegridError::NetCDF(format!(
            "Variable '{}' holds text, not numbers",
            var.name()
        ))),
        _ => Err(RegridError::NetCDF(format!(
            "Unsupported variable type: {:?}",
            vartype
        ))),
    }
}
