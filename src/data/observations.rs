//! Point observations read from raw GLM files.

use super::attributes::{AttributeMerge, Attributes, MergeDiscipline};
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Latitude of each flash in GLM L2 LCFA files.
pub const FLASH_LATITUDE: &str = "flash_lat";
/// Longitude of each flash in GLM L2 LCFA files.
pub const FLASH_LONGITUDE: &str = "flash_lon";

/// One value per point, along a named dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct PointVariable {
    /// Dimension the variable runs along.
    pub dimension: String,
    /// Unpacked values; fill values are NaN.
    pub values: Vec<f64>,
}

/// Flash events with continuous coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlashObservations {
    /// Files the events were read from.
    pub sources: Vec<PathBuf>,
    /// Dimension the coordinates run along, e.g. `number_of_flashes`.
    pub dimension: String,
    /// Latitude per event.
    pub latitude: Vec<f64>,
    /// Longitude per event.
    pub longitude: Vec<f64>,
    /// Other per-event variables requested by the caller.
    pub variables: BTreeMap<String, PointVariable>,
    /// Global attributes of the source file(s).
    pub attributes: Attributes,
}

impl FlashObservations {
    /// Number of events.
    pub fn len(&self) -> usize {
        self.latitude.len()
    }

    /// Whether there are no events.
    pub fn is_empty(&self) -> bool {
        self.latitude.is_empty()
    }

    /// Append the events of several files.
    ///
    /// Variables missing from any part are dropped, so a later aggregation
    /// over them fails the same way it would for a single file. Attributes
    /// that differ between parts are dropped.
    pub fn combine(parts: Vec<FlashObservations>) -> Result<Self> {
        let mut iter = parts.into_iter();
        let Some(mut combined) = iter.next() else {
            return Ok(Self::default());
        };

        let mut merge = AttributeMerge::new(MergeDiscipline::DropConflicts);
        merge.add(&combined.attributes)?;
        for part in iter {
            merge.add(&part.attributes)?;
            combined.sources.extend(part.sources);
            combined.latitude.extend(part.latitude);
            combined.longitude.extend(part.longitude);
            let mut part_vars = part.variables;
            combined.variables.retain(|name, var| match part_vars.remove(name) {
                Some(other) if other.dimension == var.dimension => {
                    var.values.extend(other.values);
                    true
                }
                _ => false,
            });
        }
        combined.attributes = merge.finish();
        Ok(combined)
    }
}
