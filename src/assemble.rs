//! Locating and assembling hourly regridded files over a time range.

use crate::data::{GriddedDataset, MergeDiscipline};
use crate::date_key::DateKey;
use crate::error::{RegridError, Result};
use crate::naming::{scan_directory, NamingConvention, PathKind, ResolveOptions, StorageLayout};
use crate::regrid::{BatchReport, HourlyRegridder};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Which days of a range are ready, regriddable, or missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyPlan {
    /// Every day in the range.
    pub days: Vec<DateKey>,
    /// Days whose regridded directory exists.
    pub present: Vec<DateKey>,
    /// Days with only a raw directory.
    pub to_regrid: Vec<DateKey>,
    /// Days with neither.
    pub missing: Vec<DateKey>,
}

/// Outcome of regridding the raw-only days of a plan.
#[derive(Debug, Default)]
pub struct GapFill {
    /// Per-file outcome over all regridded days.
    pub report: BatchReport,
    /// Days for which not a single hourly file could be produced.
    pub unrecovered: Vec<DateKey>,
}

/// Builds one time-ordered dataset from the hourly files of a range,
/// regridding raw days on demand.
#[derive(Debug, Clone)]
pub struct RangeAssembler {
    regridder: HourlyRegridder,
}

impl RangeAssembler {
    /// Assembler using `regridder` for storage layout and on-demand regridding.
    pub fn new(regridder: HourlyRegridder) -> Self {
        Self { regridder }
    }

    /// The regridder.
    pub fn regridder(&self) -> &HourlyRegridder {
        &self.regridder
    }

    fn layout(&self) -> &StorageLayout {
        self.regridder.layout()
    }

    /// Classify every day from `start` to `end`.
    pub fn plan(&self, start: &DateKey, end: &DateKey) -> Result<AssemblyPlan> {
        if start > end {
            return Err(RegridError::InvalidDate(format!(
                "range start {} is after end {}",
                start, end
            )));
        }

        let mut plan = AssemblyPlan {
            days: DateKey::days_between(start, end),
            ..AssemblyPlan::default()
        };
        for day in &plan.days {
            if self.layout().day_dir(day, true).is_dir() {
                plan.present.push(*day);
            } else if self.layout().day_dir(day, false).is_dir() {
                plan.to_regrid.push(*day);
            } else {
                plan.missing.push(*day);
            }
        }
        Ok(plan)
    }

    /// Regrid every raw file of the days in `plan.to_regrid`.
    ///
    /// A day that yields no hourly file keeps no regridded directory, so
    /// the next plan classes it as raw-only again instead of present.
    pub fn fill_gaps(&self, plan: &AssemblyPlan, overwrite: bool) -> Result<GapFill> {
        let mut fill = GapFill::default();
        for day in &plan.to_regrid {
            let raw_dir = self.layout().day_dir(day, false);
            let sources = self.regridder.raw_files_in(&raw_dir)?;
            info!("Regridding {} raw file(s) for {}", sources.len(), day.date());

            let day_report = self.regridder.regrid_batch(&sources, overwrite);
            if day_report.regridded.is_empty() && day_report.skipped.is_empty() {
                warn!("No hourly file could be produced for {}", day.date());
                let dir = self.layout().day_dir(day, true);
                if dir.is_dir() {
                    // Only removes an empty directory.
                    if let Err(err) = fs::remove_dir(&dir) {
                        warn!("Could not remove {}: {}", dir.display(), err);
                    }
                }
                fill.unrecovered.push(*day);
            }
            fill.report.regridded.extend(day_report.regridded);
            fill.report.skipped.extend(day_report.skipped);
            fill.report.failed.extend(day_report.failed);
        }
        Ok(fill)
    }

    /// Regridded hourly files of the configured satellite from `start` to
    /// `end`, both hours included, in time order.
    pub fn hourly_files(&self, start: &DateKey, end: &DateKey) -> Result<Vec<PathBuf>> {
        let version = self.regridder.satellite().version();
        let resolution = self.layout().resolution();
        let mut files = Vec::new();
        for day in DateKey::days_between(start, end) {
            let dir = self.layout().day_dir(&day, true);
            if !dir.is_dir() {
                continue;
            }
            let entries = scan_directory(
                &dir,
                PathKind::HourlyFile,
                true,
                NamingConvention::Current,
                ResolveOptions::default(),
            )?;
            files.extend(
                entries
                    .into_iter()
                    .filter(|(_, parsed)| {
                        parsed.satellite_version.as_deref() == Some(version)
                            && parsed.resolution == Some(resolution)
                            && parsed.key.within(start, end)
                    })
                    .map(|(path, _)| path),
            );
        }
        Ok(files)
    }

    /// Assemble the regridded series from `start` to `end`.
    ///
    /// Days without regridded data are regridded from raw files first. Days
    /// with neither, or whose raw files all fail to regrid, end in
    /// [`RegridError::MissingData`] listing all of them. Stored files on
    /// another grid are a [`RegridError::GridMismatch`]. Per-file provenance
    /// that differs between hours is dropped.
    pub fn assemble(&self, start: &DateKey, end: &DateKey) -> Result<GriddedDataset> {
        let plan = self.plan(start, end)?;
        let fill = self.fill_gaps(&plan, false)?;
        for (source, err) in &fill.report.failed {
            warn!("{} left out of the series: {}", source.display(), err);
        }

        let mut missing = plan.missing.clone();
        missing.extend(fill.unrecovered);
        if !missing.is_empty() {
            missing.sort();
            return Err(RegridError::MissingData { dates: missing });
        }

        let files = self.hourly_files(start, end)?;
        if files.is_empty() {
            return Err(RegridError::MissingData { dates: plan.days });
        }
        info!("Assembling {} hourly file(s) from {} to {}", files.len(), start, end);

        let parts = files
            .iter()
            .map(|f| self.regridder.read_regridded(f))
            .collect::<Result<Vec<_>>>()?;
        GriddedDataset::concat(parts, MergeDiscipline::DropConflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageConfig};
    use std::path::Path;

    fn assembler(root: &Path) -> RangeAssembler {
        let config = Config {
            storage: StorageConfig {
                raw_root: root.join("raw"),
                regrid_root: root.join("regrid"),
                prefix: "OR_GLM-L2-LCFA".to_string(),
            },
            ..Config::default()
        };
        RangeAssembler::new(HourlyRegridder::new(&config).unwrap())
    }

    fn touch_day(assembler: &RangeAssembler, day: u32, version: &str) {
        let layout = assembler.layout();
        for hour in 0..24 {
            let key = DateKey::new(2018, day, hour).unwrap();
            let path = layout.file_path(&key, version, true);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }
    }

    #[test]
    fn boundary_hours_are_inclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = assembler(tmp.path());
        for day in [156, 157, 158] {
            touch_day(&assembler, day, "G16");
        }

        let start = DateKey::new(2018, 156, 5).unwrap();
        let end = DateKey::new(2018, 158, 3).unwrap();
        let files = assembler.hourly_files(&start, &end).unwrap();
        assert_eq!(files.len(), 19 + 24 + 4);

        let layout = assembler.layout();
        let first = layout.file_path(&start, "G16", true);
        let last = layout.file_path(&end, "G16", true);
        assert_eq!(files.first(), Some(&first));
        assert_eq!(files.last(), Some(&last));
        assert!(!files.contains(&layout.file_path(&DateKey::new(2018, 156, 4).unwrap(), "G16", true)));
        assert!(!files.contains(&layout.file_path(&DateKey::new(2018, 158, 4).unwrap(), "G16", true)));
    }

    #[test]
    fn other_satellites_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = assembler(tmp.path());
        touch_day(&assembler, 156, "G17");

        let start = DateKey::new(2018, 156, 0).unwrap();
        let end = DateKey::new(2018, 156, 23).unwrap();
        assert!(assembler.hourly_files(&start, &end).unwrap().is_empty());
    }

    #[test]
    fn plan_partitions_days() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = assembler(tmp.path());
        let layout = assembler.layout().clone();
        let d156 = DateKey::new(2018, 156, 0).unwrap();
        let d157 = DateKey::new(2018, 157, 0).unwrap();
        let d158 = DateKey::new(2018, 158, 0).unwrap();
        fs::create_dir_all(layout.day_dir(&d156, true)).unwrap();
        fs::create_dir_all(layout.day_dir(&d157, false)).unwrap();

        let plan = assembler
            .plan(&DateKey::new(2018, 156, 5).unwrap(), &DateKey::new(2018, 158, 3).unwrap())
            .unwrap();
        assert_eq!(plan.days, vec![d156, d157, d158]);
        assert_eq!(plan.present, vec![d156]);
        assert_eq!(plan.to_regrid, vec![d157]);
        assert_eq!(plan.missing, vec![d158]);
    }

    #[test]
    fn missing_days_are_listed() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = assembler(tmp.path());
        let err = assembler
            .assemble(&DateKey::new(2018, 365, 0).unwrap(), &DateKey::new(2019, 1, 23).unwrap())
            .unwrap_err();
        match err {
            RegridError::MissingData { dates } => {
                assert_eq!(dates.len(), 2);
                assert_eq!(dates[1], DateKey::new(2019, 1, 0).unwrap());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn raw_day_without_usable_files_stays_unrecovered() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = assembler(tmp.path());
        let day = DateKey::new(2018, 157, 0).unwrap();
        let raw = assembler.layout().file_path(&DateKey::new(2018, 157, 4).unwrap(), "G16", false);
        fs::create_dir_all(raw.parent().unwrap()).unwrap();
        fs::write(&raw, b"not netcdf").unwrap();

        let plan = assembler.plan(&day, &day).unwrap();
        let fill = assembler.fill_gaps(&plan, false).unwrap();
        assert_eq!(fill.unrecovered, vec![day]);
        assert_eq!(fill.report.failed.len(), 1);
        assert!(!assembler.layout().day_dir(&day, true).exists());

        // Still classed as raw-only, so a later run tries again.
        assert_eq!(assembler.plan(&day, &day).unwrap().to_regrid, vec![day]);
        let err = assembler.assemble(&day, &day).unwrap_err();
        assert!(matches!(err, RegridError::MissingData { ref dates } if dates == &vec![day]));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = assembler(tmp.path());
        let err = assembler
            .plan(&DateKey::new(2018, 158, 0).unwrap(), &DateKey::new(2018, 156, 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, RegridError::InvalidDate(_)));
    }
}
