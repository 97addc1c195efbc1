// Cataract Scanner Command Line Interface
// Scan eye photographs, manage the eye cascade and inspect configuration

mod intake;

use anyhow::{anyhow, Context};
use cataract_core::{CascadeManager, CataractDetector, ScanConfig};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cataract")]
#[command(about = "Cataract Scanner - single-image cataract screening", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON or TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan one eye photograph
    Scan {
        /// Image to scan (png, jpg, jpeg or gif)
        image: PathBuf,

        /// Exact output path for the annotated image
        #[arg(long, short, conflicts_with = "output_dir")]
        output: Option<PathBuf>,

        /// Directory the annotated image is written to, under the sanitised source name
        #[arg(long, default_value = "output_images")]
        output_dir: PathBuf,

        /// Print a JSON report instead of the verdict line
        #[arg(long)]
        json: bool,
    },

    /// Download the eye cascade into the model directory
    FetchCascade,

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            image,
            output,
            output_dir,
            json,
        } => {
            scan(config, &image, output, &output_dir, json)?;
        }
        Commands::FetchCascade => {
            fetch_cascade(config).await?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScanConfig> {
    let config = match path {
        Some(path) => ScanConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => ScanConfig::default(),
    }
    .with_env_overrides();

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Validate the upload, run the pipeline and print the verdict
fn scan(
    config: ScanConfig,
    image: &Path,
    output: Option<PathBuf>,
    output_dir: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let source_name = image.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !intake::allowed_file(source_name) {
        return Err(anyhow!(
            "Unsupported file type {:?} (allowed: {})",
            image,
            intake::ALLOWED_EXTENSIONS.join(", ")
        ));
    }

    let output_path = match output {
        Some(path) => {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !intake::allowed_file(name) {
                return Err(anyhow!("Output path {:?} must end in an allowed image extension", path));
            }
            path
        }
        None => intake::prepare_output(image, output_dir)?,
    };

    info!("Scanning {:?} -> {:?}", image, output_path);
    let detector = CataractDetector::new(config)?;
    let report = detector.scan(image, &output_path)?;

    if json {
        let body = json!({
            "message": report.message,
            "verdict": report.verdict,
            "severity_percent": report.verdict.severity_percent(),
            "output_path": report.output_path,
            "regions": report.regions,
            "circles": report.circles,
            "selected": report.selected,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", report.message);
        println!("Annotated image: {}", report.output_path.display());
    }

    Ok(())
}

async fn fetch_cascade(config: ScanConfig) -> anyhow::Result<()> {
    if let Some(ref path) = config.region.cascade_path {
        println!("Using configured cascade at {}", path.display());
        return Ok(());
    }

    let manager = CascadeManager::new(Arc::new(config));
    println!("Fetching eye cascade...");
    let path = manager.get_eye_cascade().await?;
    println!("Eye cascade available at: {}", path.display());
    Ok(())
}

fn show_config(config: &ScanConfig) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
