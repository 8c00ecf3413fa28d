//! glm-regrid - Regrid GLM lightning flashes and compare them with model output.

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use glm_regrid::assemble::RangeAssembler;
use glm_regrid::compare::compare;
use glm_regrid::config::Config;
use glm_regrid::data::{DataReader, DataWriter};
use glm_regrid::date_key::DateKey;
use glm_regrid::naming::{NamingConvention, Satellite};
use glm_regrid::regrid::HourlyRegridder;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "glm-regrid")]
#[command(about = "Regrid GOES GLM lightning flashes and compare them with model output", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Settings that take precedence over the configuration file.
#[derive(ClapArgs, Debug)]
struct Overrides {
    /// Satellite, e.g. G16 or goes-17
    #[arg(long, global = true)]
    satellite: Option<Satellite>,

    /// Grid resolution in degrees. Only the step changes: the configured
    /// lat_min and lon_min must already be cell centres at this resolution
    #[arg(long, global = true)]
    resolution: Option<f64>,

    /// Root of the raw daily directories
    #[arg(long, global = true)]
    raw_root: Option<PathBuf>,

    /// Root of the regridded daily directories
    #[arg(long, global = true)]
    regrid_root: Option<PathBuf>,

    /// Naming convention of raw files: current, glm_array or vendor_archive
    #[arg(long, global = true)]
    convention: Option<NamingConvention>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regrid raw files, or every raw file in the given directories
    Regrid {
        /// Raw files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Recompute files that already exist
        #[arg(long)]
        overwrite: bool,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Assemble hourly regridded files over a time range into one file
    Assemble {
        /// First hour, e.g. 2018-06-05T05 or 2018-156T05
        #[arg(long)]
        start: DateKey,

        /// Last hour, included
        #[arg(long)]
        end: DateKey,

        /// Output netCDF file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Compute the lightning exposure of a model field over a time range
    Compare {
        /// FLEXPART netCDF output
        #[arg(long)]
        model: PathBuf,

        /// Model variable to weight
        #[arg(long)]
        variable: String,

        /// First hour
        #[arg(long)]
        start: DateKey,

        /// Last hour, included
        #[arg(long)]
        end: DateKey,

        /// Output netCDF file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = load_config(&args)?;
    info!("Starting glm-regrid for {}", config.satellite);

    match args.command {
        Command::Regrid {
            paths,
            overwrite,
            no_progress,
        } => {
            let regridder = HourlyRegridder::new(&config)?.with_progress(!no_progress);
            let sources = regridder.collect_sources(&paths)?;
            if sources.is_empty() {
                bail!("No raw files found in the given paths");
            }

            let report = regridder.regrid_batch(&sources, overwrite);
            println!(
                "regridded: {}, skipped: {}, failed: {}",
                report.regridded.len(),
                report.skipped.len(),
                report.failed.len()
            );
            if !report.is_success() {
                bail!("{} file(s) failed to regrid", report.failed.len());
            }
        }
        Command::Assemble { start, end, output } => {
            let assembler = RangeAssembler::new(HourlyRegridder::new(&config)?);
            let series = assembler
                .assemble(&start, &end)
                .with_context(|| format!("Failed to assemble {} to {}", start, end))?;
            DataWriter::write_gridded(&series, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} hour(s) to {}", series.times.len(), output.display());
        }
        Command::Compare {
            model,
            variable,
            start,
            end,
            output,
        } => {
            let count_variable = config.count_variable()?;
            let field = DataReader::read_model_field(&model, &variable)
                .with_context(|| format!("Failed to read '{}' from {}", variable, model.display()))?;
            let assembler = RangeAssembler::new(HourlyRegridder::new(&config)?);
            let series = assembler
                .assemble(&start, &end)
                .with_context(|| format!("Failed to assemble {} to {}", start, end))?;
            let result = compare(&field, &series, &count_variable)?;
            result
                .write(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Wrote {} for {} hour(s) to {}",
                glm_regrid::compare::EXPOSURE_VARIABLE,
                result.times.len(),
                output.display()
            );
        }
    }

    info!("glm-regrid finished");
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Some(log_path) = &args.log {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::new_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let overrides = &args.overrides;
    if let Some(satellite) = overrides.satellite {
        config.satellite = satellite;
    }
    if let Some(resolution) = overrides.resolution {
        check_resolution_override(&config, resolution)?;
        config.grid.resolution = resolution;
    }
    if let Some(root) = &overrides.raw_root {
        config.storage.raw_root = root.clone();
    }
    if let Some(root) = &overrides.regrid_root {
        config.storage.regrid_root = root.clone();
    }
    if let Some(convention) = overrides.convention {
        config.raw_convention = convention;
    }

    config.check_bounds().context("Invalid configuration")?;
    Ok(config)
}

/// The grid minimums stay as configured, so they must sit on a cell centre
/// of the new resolution, e.g. -89.75 for 0.5 but not for 1.
fn check_resolution_override(config: &Config, resolution: f64) -> Result<()> {
    if !(resolution.is_finite() && resolution > 0.0) {
        bail!("--resolution must be positive, got {}", resolution);
    }
    let grid = &config.grid;
    for (name, min) in [("lat_min", grid.lat_min), ("lon_min", grid.lon_min)] {
        let offset = (min - resolution / 2.0) / resolution;
        if (offset - offset.round()).abs() > 1e-6 {
            bail!(
                "--resolution {} does not fit {} = {}; set the grid in the config file instead",
                resolution,
                name,
                min
            );
        }
    }
    Ok(())
}
