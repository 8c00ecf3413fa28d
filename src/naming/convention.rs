//! File and directory naming schemes.

use super::PathKind;
use crate::error::RegridError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Which naming scheme a path follows.
///
/// Only [`NamingConvention::Current`] is ever produced by this crate; the
/// other two remain parseable so older archives can still be located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum NamingConvention {
    /// `<PREFIX>_<Gxx>_<YYYY>_<DDD>_<HH1>-<HH2>.nc` files and
    /// `<PREFIX>_<YYYY>_<DDD>` directories, optionally led by `<res>deg_`.
    #[default]
    Current,
    /// `GLM_array_<DDD>_<HH1>-<HH2>.nc` and `GLM_array_<DDD>_temp_<HH>.nc`,
    /// all from 2018.
    GlmArray,
    /// Vendor archive names: `OR_GLM-L2-LCFA_Gxx_s<YYYY><DDD>` daily
    /// directories and `OR_GLM-L2-LCFA_Gxx_s<YYYY><DDD><HH><MM><SS><t>_e..._c....nc`
    /// sub-hourly files.
    VendorArchive,
}

impl NamingConvention {
    /// Year implied by names that do not carry one.
    pub fn implicit_year(&self) -> Option<i32> {
        match self {
            NamingConvention::GlmArray => Some(2018),
            _ => None,
        }
    }

    /// Kind of raw data file this convention names.
    pub fn file_kind(&self) -> PathKind {
        match self {
            NamingConvention::VendorArchive => PathKind::SubHourlyFile,
            _ => PathKind::HourlyFile,
        }
    }

    /// Configuration name of this convention.
    pub fn name(&self) -> &'static str {
        match self {
            NamingConvention::Current => "current",
            NamingConvention::GlmArray => "glm_array",
            NamingConvention::VendorArchive => "vendor_archive",
        }
    }
}

impl FromStr for NamingConvention {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "current" | "default" => Ok(NamingConvention::Current),
            "glm_array" | "old_glm_filename" => Ok(NamingConvention::GlmArray),
            "vendor_archive" | "vendor" => Ok(NamingConvention::VendorArchive),
            _ => Err(RegridError::UnsupportedConvention {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for NamingConvention {
    type Error = RegridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_rejects_unknown() {
        assert_eq!("current".parse::<NamingConvention>().unwrap(), NamingConvention::Current);
        assert_eq!("GLM_ARRAY".parse::<NamingConvention>().unwrap(), NamingConvention::GlmArray);
        assert!(matches!(
            "macc".parse::<NamingConvention>(),
            Err(RegridError::UnsupportedConvention { .. })
        ));
    }
}
