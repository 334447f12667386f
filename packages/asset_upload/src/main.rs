use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

use asset_upload::{Asset, UploadConfig, load_config, run_build};

#[derive(Parser)]
#[command(name = "asset-upload")]
#[command(about = "Upload index.html and script.js to the content service")]
struct Cli {
    /// `js` or `html` to upload a single asset; anything else uploads both
    target: Option<String>,

    /// TOML config file (env vars with the ASSET_UPLOAD_ prefix override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing the built assets
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Build log to append to
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Remote folder for the uploaded files
    #[arg(long)]
    file_path: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "asset_upload=debug"
    } else {
        "asset_upload=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let mut config: UploadConfig = load_config(cli.config.as_deref())
        .extract()
        .context("Failed to load configuration")?;
    if let Some(dir) = cli.dir {
        config.asset_dir = dir;
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = log_file;
    }
    if let Some(file_path) = cli.file_path {
        config.file_path = file_path;
    }

    let assets = Asset::select(cli.target.as_deref());
    let report = run_build(&config, &assets).await?;

    for (asset, url) in &report.uploaded {
        eprintln!("  uploaded {} -> {}", asset, url);
    }
    for (asset, error) in &report.failed {
        eprintln!("  failed   {} -> {}", asset, error);
    }
    eprintln!("Build log: {}", config.log_file.display());
    Ok(())
}
