//! File and directory naming.
//!
//! This module recovers dates from satellite file names across the
//! historical naming schemes and computes canonical storage paths.

mod convention;
mod layout;
mod parser;
mod satellite;

pub use convention::NamingConvention;
pub use layout::StorageLayout;
pub use parser::{
    parse_path, DayConflictPolicy, ParsedPath, PathKind, RawFields, ResolveOptions,
};
pub use satellite::Satellite;

use crate::error::{RegridError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// List the entries of `dir` whose names parse under `convention`.
///
/// Directory entries are matched against [`PathKind::Directory`]; file
/// entries must end in `.nc`. Entries that do not parse are skipped. The
/// result is sorted by date.
pub fn scan_directory(
    dir: &Path,
    kind: PathKind,
    regridded: bool,
    convention: NamingConvention,
    options: ResolveOptions,
) -> Result<Vec<(PathBuf, ParsedPath)>> {
    let entries = std::fs::read_dir(dir).map_err(|source| RegridError::FileOpen {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut matched = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let wanted = match kind {
            PathKind::Directory => path.is_dir(),
            _ => path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("nc"),
        };
        if !wanted {
            continue;
        }

        match parse_path(&path, kind, regridded, convention, options) {
            Ok(parsed) => matched.push((path, parsed)),
            Err(err) => debug!("Skipping {}: {}", path.display(), err),
        }
    }

    matched.sort_by(|a, b| {
        (a.1.key, a.1.start_minute)
            .cmp(&(b.1.key, b.1.start_minute))
            .then_with(|| a.0.cmp(&b.0))
    });
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_key::DateKey;

    #[test]
    fn scan_matches_only_parseable_netcdf_files() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [
            "OR_GLM-L2-LCFA_G16_2018_156_20-21.nc",
            "OR_GLM-L2-LCFA_G16_2018_156_19-20.nc",
            "OR_GLM-L2-LCFA_G16_2018_156_19-20.txt",
            "notes.nc",
        ] {
            std::fs::write(tmp.path().join(name), b"").unwrap();
        }

        let found = scan_directory(
            tmp.path(),
            PathKind::HourlyFile,
            false,
            NamingConvention::Current,
            ResolveOptions::default(),
        )
        .unwrap();
        let hours: Vec<u32> = found.iter().map(|(_, p)| p.key.hour()).collect();
        assert_eq!(hours, vec![19, 20]);
        assert_eq!(found[0].1.key, DateKey::new(2018, 156, 19).unwrap());
    }
}
