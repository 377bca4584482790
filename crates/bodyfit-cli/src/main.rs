use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use bodyfit_measure::{MeasurementService, SizeChart};
use bodyfit_model::ModelHandle;

mod config;
mod input;
mod output;

use config::AppConfig;
use output::EstimateResponse;

#[derive(Parser)]
#[command(name = "bodyfit")]
#[command(about = "Body measurements from front and side photographs")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML); BODYFIT_* variables override it
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `bodyfit_fit=trace` (defaults to RUST_LOG, then info)
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate measurements for a request
    Estimate {
        /// Request JSON with keypoints, image sizes and height
        #[arg(short = 'r', long = "request")]
        request: PathBuf,

        /// Front silhouette image
        #[arg(long = "front-mask")]
        front_mask: Option<PathBuf>,

        /// Side silhouette image
        #[arg(long = "side-mask", requires = "front_mask")]
        side_mask: Option<PathBuf>,

        /// Luminance above which a mask pixel is foreground
        #[arg(long = "mask-threshold", default_value_t = 127)]
        mask_threshold: u8,

        /// Write the response here instead of stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Leave vertex and face buffers out of the response
        #[arg(long = "no-mesh")]
        no_mesh: bool,

        /// Export the fitted mesh as Wavefront OBJ
        #[arg(long = "obj")]
        obj: Option<PathBuf>,
    },

    /// Report whether the body model is loaded
    Status,

    /// Recommend sizes from a brand chart
    Recommend {
        /// Brand size chart JSON
        #[arg(long = "chart")]
        chart: PathBuf,

        /// Garment category in the chart
        #[arg(long = "category", default_value = "tops")]
        category: String,

        /// Measurements JSON, bare or as written by `estimate`
        #[arg(short = 'm', long = "measurements")]
        measurements: PathBuf,
    },
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Estimate {
            request,
            front_mask,
            side_mask,
            mask_threshold,
            output,
            no_mesh,
            obj,
        } => {
            let service = service(&config)?;
            let mut request = input::read_request(&request)?;
            input::attach_masks(&mut request, front_mask.as_deref(), side_mask.as_deref(), mask_threshold)?;

            let estimate = service.estimate(&request)?;

            if let Some(path) = obj {
                match estimate.mesh() {
                    Some(mesh) => {
                        let file = File::create(&path)
                            .with_context(|| format!("creating {}", path.display()))?;
                        output::write_obj(mesh, BufWriter::new(file))?;
                        tracing::info!("Wrote mesh to {}", path.display());
                    }
                    None => tracing::warn!("No mesh for the heuristic estimate, {} not written", path.display()),
                }
            }

            write_json(&EstimateResponse::new(&estimate, !no_mesh), output.as_deref())
        }
        Commands::Status => {
            let handle = discover(&config)?;
            println!("3D engine: {}", handle.status());
            println!("Model gender: {}", handle.gender());
            if let Some(source) = handle.source() {
                println!("Model file: {}", source.display());
            }
            Ok(())
        }
        Commands::Recommend {
            chart,
            category,
            measurements,
        } => {
            let chart = SizeChart::from_json_file(&chart)
                .with_context(|| format!("loading size chart {}", chart.display()))?;
            let measurements = input::read_measurements(&measurements)?;
            write_json(&chart.recommend(&category, &measurements), None)
        }
    }
}

fn discover(config: &AppConfig) -> Result<ModelHandle> {
    ModelHandle::discover(&config.model.dir, config.model.gender)
        .with_context(|| format!("loading body model from {}", config.model.dir.display()))
}

fn service(config: &AppConfig) -> Result<MeasurementService> {
    Ok(MeasurementService::new(
        discover(config)?,
        config.fit.clone(),
        &config.measurement,
    ))
}

fn write_json<T: serde::Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, value)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}
