//! Global and variable attributes, and how they merge.

use crate::error::{RegridError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An attribute value as stored in a NetCDF file.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Text.
    Str(String),
    /// List of strings.
    Strs(Vec<String>),
    /// 16-bit integer.
    Short(i16),
    /// 32-bit integer.
    Int(i32),
    /// Any other integer type, widened.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Array of 16-bit integers.
    Shorts(Vec<i16>),
    /// Array of 32-bit integers.
    Ints(Vec<i32>),
    /// Array of other integers, widened.
    Longs(Vec<i64>),
    /// Array of 32-bit floats.
    Floats(Vec<f32>),
    /// Array of 64-bit floats.
    Doubles(Vec<f64>),
}

impl AttrValue {
    /// Numeric value of a scalar attribute, or of a numeric string.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Short(v) => Some(f64::from(*v)),
            AttrValue::Int(v) => Some(f64::from(*v)),
            AttrValue::Long(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(f64::from(*v)),
            AttrValue::Double(v) => Some(*v),
            AttrValue::Shorts(v) if v.len() == 1 => Some(f64::from(v[0])),
            AttrValue::Ints(v) if v.len() == 1 => Some(f64::from(v[0])),
            AttrValue::Floats(v) if v.len() == 1 => Some(f64::from(v[0])),
            AttrValue::Doubles(v) if v.len() == 1 => Some(v[0]),
            AttrValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text of a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(v) => write!(f, "{}", v),
            AttrValue::Strs(v) => write!(f, "{}", v.join(", ")),
            AttrValue::Short(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Long(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Double(v) => write!(f, "{}", v),
            AttrValue::Shorts(v) => write!(f, "{:?}", v),
            AttrValue::Ints(v) => write!(f, "{:?}", v),
            AttrValue::Longs(v) => write!(f, "{:?}", v),
            AttrValue::Floats(v) => write!(f, "{:?}", v),
            AttrValue::Doubles(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Double(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v)
    }
}

impl From<netcdf::AttributeValue> for AttrValue {
    fn from(value: netcdf::AttributeValue) -> Self {
        use netcdf::AttributeValue;

        let widen = |v: Vec<i64>| AttrValue::Longs(v);
        match value {
            AttributeValue::Uchar(v) => AttrValue::Long(i64::from(v)),
            AttributeValue::Schar(v) => AttrValue::Long(i64::from(v)),
            AttributeValue::Ushort(v) => AttrValue::Long(i64::from(v)),
            AttributeValue::Short(v) => AttrValue::Short(v),
            AttributeValue::Uint(v) => AttrValue::Long(i64::from(v)),
            AttributeValue::Int(v) => AttrValue::Int(v),
            AttributeValue::Ulonglong(v) => AttrValue::Long(v as i64),
            AttributeValue::Longlong(v) => AttrValue::Long(v),
            AttributeValue::Float(v) => AttrValue::Float(v),
            AttributeValue::Double(v) => AttrValue::Double(v),
            AttributeValue::Str(v) => AttrValue::Str(v),
            AttributeValue::Uchars(v) => widen(v.into_iter().map(i64::from).collect()),
            AttributeValue::Schars(v) => widen(v.into_iter().map(i64::from).collect()),
            AttributeValue::Ushorts(v) => widen(v.into_iter().map(i64::from).collect()),
            AttributeValue::Shorts(v) => AttrValue::Shorts(v),
            AttributeValue::Uints(v) => widen(v.into_iter().map(i64::from).collect()),
            AttributeValue::Ints(v) => AttrValue::Ints(v),
            AttributeValue::Ulonglongs(v) => widen(v.into_iter().map(|x| x as i64).collect()),
            AttributeValue::Longlongs(v) => AttrValue::Longs(v),
            AttributeValue::Floats(v) => AttrValue::Floats(v),
            AttributeValue::Doubles(v) => AttrValue::Doubles(v),
            AttributeValue::Strs(v) => AttrValue::Strs(v),
        }
    }
}

impl From<&AttrValue> for netcdf::AttributeValue {
    fn from(value: &AttrValue) -> Self {
        use netcdf::AttributeValue;

        match value.clone() {
            AttrValue::Str(v) => AttributeValue::Str(v),
            AttrValue::Strs(v) => AttributeValue::Strs(v),
            AttrValue::Short(v) => AttributeValue::Short(v),
            AttrValue::Int(v) => AttributeValue::Int(v),
            AttrValue::Long(v) => AttributeValue::Longlong(v),
            AttrValue::Float(v) => AttributeValue::Float(v),
            AttrValue::Double(v) => AttributeValue::Double(v),
            AttrValue::Shorts(v) => AttributeValue::Shorts(v),
            AttrValue::Ints(v) => AttributeValue::Ints(v),
            AttrValue::Longs(v) => AttributeValue::Longlongs(v),
            AttrValue::Floats(v) => AttributeValue::Floats(v),
            AttrValue::Doubles(v) => AttributeValue::Doubles(v),
        }
    }
}

/// Named attributes, ordered by name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// What to do when two sources define one attribute differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDiscipline {
    /// Differing values are an error.
    NoConflicts,
    /// Differing values remove the attribute from the result.
    DropConflicts,
}

/// Accumulates attributes from several sources under one discipline.
#[derive(Debug, Clone)]
pub struct AttributeMerge {
    discipline: MergeDiscipline,
    merged: Attributes,
    dropped: BTreeSet<String>,
}

impl AttributeMerge {
    /// Start an empty merge.
    pub fn new(discipline: MergeDiscipline) -> Self {
        Self {
            discipline,
            merged: Attributes::new(),
            dropped: BTreeSet::new(),
        }
    }

    /// Merge in one more set of attributes.
    pub fn add(&mut self, incoming: &Attributes) -> Result<()> {
        for (name, value) in incoming {
            if self.dropped.contains(name) {
                continue;
            }
            match self.merged.get(name) {
                None => {
                    self.merged.insert(name.clone(), value.clone());
                }
                Some(existing) if existing == value => {}
                Some(existing) => match self.discipline {
                    MergeDiscipline::NoConflicts => {
                        return Err(RegridError::MergeConflict {
                            attribute: name.clone(),
                            existing: existing.to_string(),
                            incoming: value.to_string(),
                        })
                    }
                    MergeDiscipline::DropConflicts => {
                        self.merged.remove(name);
                        self.dropped.insert(name.clone());
                    }
                },
            }
        }
        Ok(())
    }

    /// The merged attributes.
    pub fn finish(self) -> Attributes {
        self.merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttrValue::from(*v)))
            .collect()
    }

    #[test]
    fn no_conflicts_accepts_identical_values() {
        let mut merge = AttributeMerge::new(MergeDiscipline::NoConflicts);
        merge.add(&attrs(&[("a", "1"), ("b", "2")])).unwrap();
        merge.add(&attrs(&[("a", "1"), ("c", "3")])).unwrap();
        let merged = merge.finish();
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn no_conflicts_rejects_differing_values() {
        let mut merge = AttributeMerge::new(MergeDiscipline::NoConflicts);
        merge.add(&attrs(&[("a", "1")])).unwrap();
        let err = merge.add(&attrs(&[("a", "2")])).unwrap_err();
        assert!(matches!(err, RegridError::MergeConflict { ref attribute, .. } if attribute == "a"));
    }

    #[test]
    fn drop_conflicts_removes_attribute_for_good() {
        let mut merge = AttributeMerge::new(MergeDiscipline::DropConflicts);
        merge.add(&attrs(&[("source", "x.nc"), ("platform_ID", "G16")])).unwrap();
        merge.add(&attrs(&[("source", "y.nc"), ("platform_ID", "G16")])).unwrap();
        merge.add(&attrs(&[("source", "x.nc")])).unwrap();
        let merged = merge.finish();
        assert!(!merged.contains_key("source"));
        assert_eq!(merged["platform_ID"], AttrValue::from("G16"));
    }

    #[test]
    fn numeric_strings_convert() {
        assert_eq!(AttrValue::from("0.5").as_f64(), Some(0.5));
        assert_eq!(AttrValue::Floats(vec![2.0]).as_f64(), Some(2.0));
        assert_eq!(AttrValue::Ints(vec![1, 2]).as_f64(), None);
    }
}
