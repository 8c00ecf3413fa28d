//! Regridding of raw GLM files into hourly gridded files.
//!
//! Each raw file maps to exactly one regridded file whose path is computed
//! from the date in the raw file name. Sub-hourly vendor files for the same
//! hour are combined into one regridded file.

use crate::config::Config;
use crate::data::{
    AttrValue, AttributeMerge, Attributes, DataReader, DataWriter, FlashObservations,
    GriddedDataset, MergeDiscipline,
};
use crate::error::{RegridError, Result};
use crate::grid::{AggregateRequest, GridSpec, SnappedFlashes};
use crate::naming::{
    parse_path, scan_directory, NamingConvention, ParsedPath, ResolveOptions, Satellite,
    StorageLayout,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Source attribute renamed on copy to mark it as pre-regrid metadata.
const PROCESSING_LEVEL: &str = "processing_level";
const PRE_REGRID_PROCESSING_LEVEL: &str = "pre_regrid_data_processing_level";

/// Outcome of regridding many files.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Destinations written in this run.
    pub regridded: Vec<PathBuf>,
    /// Destinations that already existed and were left alone.
    pub skipped: Vec<PathBuf>,
    /// Sources that could not be regridded, with the reason.
    pub failed: Vec<(PathBuf, RegridError)>,
}

impl BatchReport {
    /// Whether every source was handled.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Turns raw flash files into hourly gridded files.
#[derive(Debug, Clone)]
pub struct HourlyRegridder {
    layout: StorageLayout,
    grid: GridSpec,
    requests: Vec<AggregateRequest>,
    provenance: Vec<String>,
    satellite: Satellite,
    convention: NamingConvention,
    options: ResolveOptions,
    show_progress: bool,
}

impl HourlyRegridder {
    /// Regridder for a checked configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.check_bounds()?;
        Ok(Self {
            layout: config.layout(),
            grid: config.grid,
            requests: config.aggregate_requests()?,
            provenance: config.provenance_attributes.clone(),
            satellite: config.satellite,
            convention: config.raw_convention,
            options: config.resolve_options(),
            show_progress: false,
        })
    }

    /// Draw a progress bar on stderr during batches.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Storage layout.
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Target grid.
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Configured satellite.
    pub fn satellite(&self) -> Satellite {
        self.satellite
    }

    /// Naming convention of raw files.
    pub fn convention(&self) -> NamingConvention {
        self.convention
    }

    /// Parse a raw file name and compute where its regridded file goes.
    pub fn destination(&self, source: &Path) -> Result<(ParsedPath, PathBuf)> {
        let parsed = parse_path(
            source,
            self.convention.file_kind(),
            false,
            self.convention,
            self.options,
        )?;
        let version = parsed
            .satellite_version
            .as_deref()
            .unwrap_or_else(|| self.satellite.version());
        let destination = self.layout.file_path(&parsed.key, version, true);
        Ok((parsed, destination))
    }

    /// Raw files in `dir` that follow the raw naming convention.
    pub fn raw_files_in(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(scan_directory(
            dir,
            self.convention.file_kind(),
            false,
            self.convention,
            self.options,
        )?
        .into_iter()
        .map(|(path, _)| path)
        .collect())
    }

    /// Expand directories into the raw files they hold; files pass through.
    pub fn collect_sources(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut sources = Vec::new();
        for input in inputs {
            if input.is_dir() {
                sources.extend(self.raw_files_in(input)?);
            } else {
                sources.push(input.clone());
            }
        }
        Ok(sources)
    }

    /// Regrid one raw file.
    ///
    /// When the destination exists and `overwrite` is false, the existing
    /// file is read and returned without recomputation.
    pub fn regrid_file(&self, source: &Path, overwrite: bool) -> Result<GriddedDataset> {
        self.regrid_group(&[source.to_path_buf()], overwrite)
    }

    /// Regrid raw files that share one destination hour into one file.
    pub fn regrid_group(&self, sources: &[PathBuf], overwrite: bool) -> Result<GriddedDataset> {
        let first = sources
            .first()
            .ok_or_else(|| RegridError::InvalidConfig("No source files to regrid".to_string()))?;
        let (parsed, destination) = self.destination(first)?;
        for other in &sources[1..] {
            if self.destination(other)?.1 != destination {
                return Err(RegridError::path_parse(
                    other,
                    format!("does not belong to {}", destination.display()),
                ));
            }
        }

        if destination.exists() && !overwrite {
            debug!("{} exists, reading it", destination.display());
            return self.read_regridded(&destination);
        }

        if let Some(dir) = destination.parent() {
            StorageLayout::ensure_dir(dir)?;
        }

        let wanted: Vec<&str> = self
            .requests
            .iter()
            .filter(|r| r.reads_variable())
            .map(|r| r.variable.as_str())
            .collect();
        let parts = sources
            .iter()
            .map(|s| DataReader::read_observations(s, &wanted))
            .collect::<Result<Vec<_>>>()?;
        let observations = FlashObservations::combine(parts)?;

        let mut dataset = GriddedDataset::empty(&self.grid, parsed.key.to_datetime());
        let snapped = SnappedFlashes::new(&self.grid, &observations);
        let mut merge = AttributeMerge::new(MergeDiscipline::NoConflicts);
        for request in &self.requests {
            let output = snapped.aggregate(request)?;
            merge.add(&output.global_attributes)?;
            dataset.insert(output.name, output.variable)?;
        }
        merge.add(&self.provenance_attributes(&observations))?;
        merge.add(&self.stamp(sources, parsed.satellite_version.as_deref()))?;
        dataset.attributes = merge.finish();

        DataWriter::write_gridded(&dataset, &destination)?;
        info!(
            "Regridded {} flashes from {} file(s) into {}",
            observations.len(),
            sources.len(),
            destination.display()
        );
        Ok(dataset)
    }

    /// Read a stored regridded file, which must lie on the configured grid.
    ///
    /// File names only carry the resolution, so a file written with other
    /// grid bounds is found under the same path.
    pub fn read_regridded(&self, path: &Path) -> Result<GriddedDataset> {
        let dataset = DataReader::read_gridded(path)?;
        self.grid
            .ensure_matches(&dataset.latitudes, &dataset.longitudes)
            .map_err(|err| match err {
                RegridError::GridMismatch(reason) => RegridError::grid_mismatch(format!(
                    "{} is not on the configured grid: {}",
                    path.display(),
                    reason
                )),
                other => other,
            })?;
        Ok(dataset)
    }

    /// Regrid many raw files, continuing past failures.
    ///
    /// Files are grouped by destination hour first, so several sub-hourly
    /// files end up in one hourly file.
    pub fn regrid_batch(&self, sources: &[PathBuf], overwrite: bool) -> BatchReport {
        let mut report = BatchReport::default();
        let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for source in sources {
            match self.destination(source) {
                Ok((_, destination)) => groups.entry(destination).or_default().push(source.clone()),
                Err(err) => {
                    error!("Skipping {}: {}", source.display(), err);
                    report.failed.push((source.clone(), err));
                }
            }
        }

        let bar = self.progress_bar(groups.len());
        for (destination, members) in groups {
            bar.set_message(file_name(&destination));
            let existed = destination.exists();
            match self.regrid_group(&members, overwrite) {
                Ok(_) if existed && !overwrite => report.skipped.push(destination),
                Ok(_) => report.regridded.push(destination),
                Err(err) => {
                    error!("Failed to regrid {}: {}", members[0].display(), err);
                    report.failed.push((members[0].clone(), err));
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            "Regridded {}, skipped {}, failed {}",
            report.regridded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    fn provenance_attributes(&self, observations: &FlashObservations) -> Attributes {
        self.provenance
            .iter()
            .filter_map(|name| {
                let value = observations.attributes.get(name)?;
                let name = if name == PROCESSING_LEVEL {
                    PRE_REGRID_PROCESSING_LEVEL.to_string()
                } else {
                    name.clone()
                };
                Some((name, value.clone()))
            })
            .collect()
    }

    fn stamp(&self, sources: &[PathBuf], version: Option<&str>) -> Attributes {
        let files: Vec<String> = sources.iter().map(|s| file_name(s)).collect();
        let mut attrs = Attributes::new();
        attrs.insert(
            "grid_resolution".to_string(),
            AttrValue::Double(self.grid.resolution),
        );
        attrs.insert(
            "pre_regrid_satellite_file".to_string(),
            AttrValue::from(files.join(", ")),
        );
        attrs.insert(
            "regrid_file_creation_date".to_string(),
            AttrValue::from(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        );
        attrs.insert(
            "satellite_version".to_string(),
            AttrValue::from(version.unwrap_or_else(|| self.satellite.version())),
        );
        attrs
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        let target = if self.show_progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        let bar = ProgressBar::with_draw_target(Some(len as u64), target).with_style(style);
        bar.set_prefix("Regridding");
        bar
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::date_key::DateKey;

    fn config(root: &Path) -> Config {
        Config {
            storage: StorageConfig {
                raw_root: root.join("raw"),
                regrid_root: root.join("regrid"),
                prefix: "OR_GLM-L2-LCFA".to_string(),
            },
            ..Config::default()
        }
    }

    #[test]
    fn destination_follows_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let regridder = HourlyRegridder::new(&config(tmp.path())).unwrap();
        let (parsed, dest) = regridder
            .destination(Path::new("OR_GLM-L2-LCFA_G16_2018_156_19-20.nc"))
            .unwrap();
        assert_eq!(parsed.key, DateKey::new(2018, 156, 19).unwrap());
        assert_eq!(
            dest,
            tmp.path()
                .join("regrid/0.5deg_OR_GLM-L2-LCFA_2018_156/0.5deg_OR_GLM-L2-LCFA_G16_2018_156_19-20.nc")
        );
    }

    #[test]
    fn legacy_names_use_configured_satellite() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.raw_convention = NamingConvention::GlmArray;
        cfg.satellite = Satellite::Goes17;
        let regridder = HourlyRegridder::new(&cfg).unwrap();
        let (_, dest) = regridder.destination(Path::new("GLM_array_156_temp_19.nc")).unwrap();
        assert!(dest.ends_with("0.5deg_OR_GLM-L2-LCFA_G17_2018_156_19-20.nc"));
    }

    #[test]
    fn vendor_files_of_one_hour_share_a_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.raw_convention = NamingConvention::VendorArchive;
        let regridder = HourlyRegridder::new(&cfg).unwrap();
        let a = regridder
            .destination(Path::new(
                "OR_GLM-L2-LCFA_G16_s20181561900000_e20181561900200_c20181561900227.nc",
            ))
            .unwrap()
            .1;
        let b = regridder
            .destination(Path::new(
                "OR_GLM-L2-LCFA_G16_s20181561959400_e20181562000000_c20181562000027.nc",
            ))
            .unwrap()
            .1;
        assert_eq!(a, b);
    }

    #[test]
    fn batch_continues_past_bad_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let regridder = HourlyRegridder::new(&config(tmp.path())).unwrap();
        let report = regridder.regrid_batch(
            &[
                PathBuf::from("not_a_glm_file.nc"),
                tmp.path().join("OR_GLM-L2-LCFA_G16_2018_156_19-20.nc"),
            ],
            false,
        );
        assert_eq!(report.failed.len(), 2);
        assert!(report.regridded.is_empty());
        assert!(matches!(report.failed[0].1, RegridError::PathParse { .. }));
        assert!(matches!(report.failed[1].1, RegridError::FileOpen { .. }));
        assert!(!report.is_success());
    }

    #[test]
    fn provenance_renames_processing_level() {
        let tmp = tempfile::tempdir().unwrap();
        let regridder = HourlyRegridder::new(&config(tmp.path())).unwrap();
        let mut obs = FlashObservations::default();
        obs.attributes.insert("processing_level".into(), AttrValue::from("L2"));
        obs.attributes.insert("platform_ID".into(), AttrValue::from("G16"));
        obs.attributes.insert("title".into(), AttrValue::from("GLM L2"));

        let attrs = regridder.provenance_attributes(&obs);
        assert_eq!(attrs["pre_regrid_data_processing_level"], AttrValue::from("L2"));
        assert_eq!(attrs["platform_ID"], AttrValue::from("G16"));
        assert!(!attrs.contains_key("processing_level"));
        assert!(!attrs.contains_key("title"));
    }
}
