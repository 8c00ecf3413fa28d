//! Canonical storage paths for raw and regridded data.
//!
//! The inverse of the parser for [`NamingConvention::Current`](super::NamingConvention::Current).
//! Computing a path never touches the file system; [`StorageLayout::ensure_dir`]
//! is the separate step that creates directories.

use crate::date_key::DateKey;
use crate::error::{RegridError, Result};
use std::path::{Path, PathBuf};

/// Root directories and naming parameters for the two storage tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageLayout {
    raw_root: PathBuf,
    regrid_root: PathBuf,
    prefix: String,
    resolution: f64,
}

impl StorageLayout {
    /// Create a layout.
    pub fn new(
        raw_root: impl Into<PathBuf>,
        regrid_root: impl Into<PathBuf>,
        prefix: impl Into<String>,
        resolution: f64,
    ) -> Self {
        Self {
            raw_root: raw_root.into(),
            regrid_root: regrid_root.into(),
            prefix: prefix.into(),
            resolution,
        }
    }

    /// Grid resolution in degrees.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// `<res>deg`, e.g. `0.5deg`.
    pub fn resolution_tag(&self) -> String {
        format!("{}deg", self.resolution)
    }

    /// Name of the daily directory for `key`.
    pub fn day_dir_name(&self, key: &DateKey, regridded: bool) -> String {
        let name = format!("{}_{}_{:03}", self.prefix, key.year(), key.day_of_year());
        self.tag(name, regridded)
    }

    /// Daily directory for `key`.
    pub fn day_dir(&self, key: &DateKey, regridded: bool) -> PathBuf {
        self.root(regridded).join(self.day_dir_name(key, regridded))
    }

    /// Name of the hourly file for `key`.
    pub fn file_name(&self, key: &DateKey, version: &str, regridded: bool) -> String {
        let name = format!(
            "{}_{}_{}_{:03}_{:02}-{:02}.nc",
            self.prefix,
            version,
            key.year(),
            key.day_of_year(),
            key.hour(),
            key.hour() + 1
        );
        self.tag(name, regridded)
    }

    /// Hourly file for `key`, inside its daily directory.
    pub fn file_path(&self, key: &DateKey, version: &str, regridded: bool) -> PathBuf {
        self.day_dir(key, regridded)
            .join(self.file_name(key, version, regridded))
    }

    /// Create `dir` and its parents.
    pub fn ensure_dir(dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|source| RegridError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })
    }

    fn root(&self, regridded: bool) -> &Path {
        if regridded {
            &self.regrid_root
        } else {
            &self.raw_root
        }
    }

    fn tag(&self, name: String, regridded: bool) -> String {
        if regridded {
            format!("{}_{}", self.resolution_tag(), name)
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{parse_path, NamingConvention, PathKind, ResolveOptions};
    use std::collections::HashSet;

    fn layout() -> StorageLayout {
        StorageLayout::new("/glm/raw", "/glm/regrid", "OR_GLM-L2-LCFA", 0.5)
    }

    #[test]
    fn builds_current_names() {
        let key = DateKey::new(2018, 156, 19).unwrap();
        let layout = layout();
        assert_eq!(
            layout.file_path(&key, "G16", false),
            PathBuf::from("/glm/raw/OR_GLM-L2-LCFA_2018_156/OR_GLM-L2-LCFA_G16_2018_156_19-20.nc")
        );
        assert_eq!(
            layout.file_path(&key, "G16", true),
            PathBuf::from(
                "/glm/regrid/0.5deg_OR_GLM-L2-LCFA_2018_156/0.5deg_OR_GLM-L2-LCFA_G16_2018_156_19-20.nc"
            )
        );
    }

    #[test]
    fn generated_paths_round_trip_and_never_collide() {
        let layout = layout();
        let mut seen = HashSet::new();
        for year in [2018, 2020] {
            for day in [1, 59, 60, 200, 365] {
                for hour in [0, 9, 23] {
                    let key = DateKey::new(year, day, hour).unwrap();
                    for regridded in [false, true] {
                        let path = layout.file_path(&key, "G16", regridded);
                        assert!(seen.insert(path.clone()), "collision at {}", path.display());
                        let parsed = parse_path(
                            &path,
                            PathKind::HourlyFile,
                            regridded,
                            NamingConvention::Current,
                            ResolveOptions::default(),
                        )
                        .unwrap();
                        assert_eq!(parsed.key, key);
                        assert_eq!(parsed.end_hour, Some(hour + 1));

                        let dir = parse_path(
                            &layout.day_dir(&key, regridded),
                            PathKind::Directory,
                            regridded,
                            NamingConvention::Current,
                            ResolveOptions::daily(),
                        )
                        .unwrap();
                        assert_eq!(dir.key, key.day());
                    }
                }
            }
        }
    }

    #[test]
    fn whole_degree_resolution_has_no_fraction() {
        let layout = StorageLayout::new("r", "g", "OR_GLM-L2-LCFA", 1.0);
        assert_eq!(layout.resolution_tag(), "1deg");
    }

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        StorageLayout::ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
