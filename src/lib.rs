//! glm-regrid - Regridding of GOES GLM lightning flashes for comparison with
//! transport-model output.
//!
//! Raw GLM flash files are snapped onto a regular latitude/longitude grid,
//! one file per hour, and stored under a day-sharded directory layout.
//! Hourly files over a time range are assembled into a single series, which
//! can be weighted against a FLEXPART field to give a lightning exposure.
//!
//! # Features
//!
//! - Date recovery from current and legacy file and directory names
//! - Nearest-neighbour regridding with flash counts and log10 histograms
//! - On-demand regridding of days missing from the regridded archive
//! - Lightning exposure of model output
//!
//! # Example
//!
//! ```ignore
//! use glm_regrid::{config::Config, assemble::RangeAssembler, regrid::HourlyRegridder};
//!
//! let config = Config::new_from_file(Path::new("glm.yaml"))?;
//! let assembler = RangeAssembler::new(HourlyRegridder::new(&config)?);
//! let series = assembler.assemble(&"2018-156T05".parse()?, &"2018-158T03".parse()?)?;
//! println!("{} hours assembled", series.times.len());
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unsafe_code)]

pub mod assemble;
pub mod compare;
pub mod config;
pub mod data;
pub mod date_key;
pub mod error;
pub mod grid;
pub mod naming;
pub mod regrid;

pub use error::{RegridError, Result};
