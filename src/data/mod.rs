//! Data reading, writing and representation.
//!
//! Raw GLM files are read into [`FlashObservations`]; regridded files and
//! assembled series are [`GriddedDataset`]s; transport-model output is a
//! [`ModelField`].

mod attributes;
mod dataset;
mod observations;
mod reader;
mod time;
mod variable_data;
mod writer;

pub use attributes::{AttrValue, AttributeMerge, Attributes, MergeDiscipline};
pub use dataset::{
    BinAxis, GriddedDataset, GriddedVariable, LATITUDE_DIM, LONGITUDE_DIM, TIME_DIM,
};
pub use observations::{FlashObservations, PointVariable, FLASH_LATITUDE, FLASH_LONGITUDE};
pub use reader::{DataReader, ModelField};
pub use time::{TimeUnits, NANOSECONDS_SINCE_EPOCH};
pub use variable_data::{read_counts, read_numeric, COUNT_FILL_VALUE};
pub use writer::DataWriter;

pub(crate) use writer::{atomic_write, put_coordinate, put_counts, put_global_attributes, put_time};
