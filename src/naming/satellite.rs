//! Supported satellites.

use crate::error::RegridError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// A GOES-R series platform carrying a GLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Satellite {
    /// GOES-16.
    #[default]
    Goes16,
    /// GOES-17.
    Goes17,
    /// GOES-18.
    Goes18,
    /// GOES-19.
    Goes19,
}

impl Satellite {
    /// Hardware version token used in file names, e.g. `G16`.
    pub fn version(&self) -> &'static str {
        match self {
            Satellite::Goes16 => "G16",
            Satellite::Goes17 => "G17",
            Satellite::Goes18 => "G18",
            Satellite::Goes19 => "G19",
        }
    }
}

impl FromStr for Satellite {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "G16" | "GOES16" => Ok(Satellite::Goes16),
            "G17" | "GOES17" => Ok(Satellite::Goes17),
            "G18" | "GOES18" => Ok(Satellite::Goes18),
            "G19" | "GOES19" => Ok(Satellite::Goes19),
            _ => Err(RegridError::UnsupportedSatellite {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Satellite {
    type Error = RegridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Satellite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_spellings() {
        for name in ["G16", "goes16", "GOES-16", "goes_16"] {
            assert_eq!(name.parse::<Satellite>().unwrap(), Satellite::Goes16);
        }
        assert_eq!("goes-17".parse::<Satellite>().unwrap().version(), "G17");
    }

    #[test]
    fn rejects_other_platforms() {
        let err = "himawari8".parse::<Satellite>().unwrap_err();
        assert!(matches!(err, RegridError::UnsupportedSatellite { .. }));
    }
}
