use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use clipcrop::{
    composition::CropSpecification,
    compression::FfmpegCompressor,
    config::Config,
    export::FfmpegExporter,
    media::{FfprobeMediaStore, Rect},
    pipeline::{Coordinator, PipelineOutcome},
    progress::TracingProgressSink,
    video::FfmpegRunner,
};

#[derive(Parser)]
#[command(
    name = "clipcrop",
    version,
    about = "Crop, trim and compress videos from a media library",
    long_about = "clipcrop fetches each asset from the library, cuts out the crop rectangle, trims it to the maximum duration, exports it and re-compresses it to 1 Mbps."
)]
struct Cli {
    /// Directory holding the media library
    #[arg(short, long)]
    library: PathBuf,

    /// Crop rectangle as X,Y,W,H in oriented pixels
    #[arg(long, value_parser = parse_crop)]
    crop: Rect,

    /// Maximum output duration in seconds
    #[arg(short, long)]
    max_duration: Option<f64>,

    /// Move finished files into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Asset names inside the library
    #[arg(required = true)]
    assets: Vec<String>,
}

fn parse_crop(value: &str) -> std::result::Result<Rect, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid number in crop: {}", e))?;

    match parts.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(Rect::new(*x, *y, *w, *h)),
        [_, _, _, _] => Err("crop width and height must be positive".to_string()),
        _ => Err("crop must be X,Y,W,H".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting clipcrop v{}", env!("CARGO_PKG_VERSION"));
    info!("Library: {:?}", cli.library);
    info!("Assets: {}", cli.assets.join(", "));

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    config.validate()?;

    let runner = FfmpegRunner::new(&config.tools.ffmpeg);
    if !runner.check_available() {
        anyhow::bail!("ffmpeg not found at {:?}", config.tools.ffmpeg);
    }

    if let Some(dir) = &cli.output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating output directory {:?}", dir))?;
    }

    let store = FfprobeMediaStore::new(&cli.library, &config.tools.ffprobe);
    let exporter = FfmpegExporter::new(runner.clone()).with_video_codec(config.export.video_codec.clone());
    let compressor = FfmpegCompressor::new(runner, &config.tools.ffprobe);

    let (handle, coordinator) = Coordinator::spawn(
        &config,
        Arc::new(store),
        Arc::new(exporter),
        Arc::new(compressor),
        Arc::new(TracingProgressSink::new()),
    );

    let cancel_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling all work");
            if let Err(e) = cancel_handle.force_cancel_all().await {
                error!("Could not cancel: {}", e);
            }
        }
    });

    let mut crop = CropSpecification::new(cli.crop);
    if let Some(seconds) = cli.max_duration {
        crop = crop.with_max_duration(seconds);
    }

    handle.begin_batch(cli.assets.len())?;
    let mut pending = Vec::new();
    for asset in &cli.assets {
        match handle.fetch_and_crop(asset.as_str(), crop).await {
            Ok(reply) => pending.push((asset.clone(), reply)),
            Err(e) => error!("{}: {}", asset, e.user_message()),
        }
    }

    let mut failures = cli.assets.len() - pending.len();
    for (asset, reply) in pending {
        match reply.await {
            Ok(PipelineOutcome::Completed(path)) => {
                let path = match &cli.output_dir {
                    Some(dir) => deliver(&path, dir, &asset).await?,
                    None => path,
                };
                println!("{}\t{}", asset, path.display());
            }
            Ok(PipelineOutcome::Failed(e)) => {
                error!("{}: {}", asset, e.user_message());
                failures += 1;
            }
            Ok(PipelineOutcome::Cancelled) | Err(_) => {
                warn!("{}: cancelled", asset);
                failures += 1;
            }
            Ok(PipelineOutcome::Unavailable) => {
                warn!("{}: not available in the library", asset);
                failures += 1;
            }
        }
    }

    handle.shutdown()?;
    drop(handle);
    coordinator.await?;

    if failures > 0 {
        anyhow::bail!("{} of {} asset(s) did not complete", failures, cli.assets.len());
    }

    info!("All {} asset(s) done", cli.assets.len());
    Ok(())
}

/// Move a finished file next to its siblings in `dir`
async fn deliver(path: &Path, dir: &Path, asset: &str) -> Result<PathBuf> {
    let stem = Path::new(asset)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| asset.to_string());
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
    let target = dir.join(format!("{}_cropped.{}", stem, extension));

    if tokio::fs::rename(path, &target).await.is_err() {
        // Different filesystem
        tokio::fs::copy(path, &target)
            .await
            .with_context(|| format!("copying {:?} to {:?}", path, target))?;
        tokio::fs::remove_file(path).await?;
    }

    Ok(target)
}
