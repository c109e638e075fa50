use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::compression::compressor::{CompressionOutcome, CompressionSettings, VideoCompressor};
use crate::error::{CompressionError, Result};
use crate::media::AssetId;
use crate::scratch::{remove_if_exists, ScratchDir};
use crate::video::VideoFileType;

/// Events a compression job reports back to the coordinator
#[derive(Debug)]
pub enum CompressionUpdate {
    /// Informational only
    Started { asset: AssetId, output: PathBuf },
    Progress { asset: AssetId, output: PathBuf, fraction: f64 },
    Succeeded { asset: AssetId, output: PathBuf },
    Failed {
        asset: AssetId,
        output: PathBuf,
        error: CompressionError,
    },
    /// Silent terminal state
    Cancelled { asset: AssetId, output: PathBuf },
}

impl CompressionUpdate {
    pub fn asset(&self) -> &AssetId {
        match self {
            CompressionUpdate::Started { asset, .. }
            | CompressionUpdate::Progress { asset, .. }
            | CompressionUpdate::Succeeded { asset, .. }
            | CompressionUpdate::Failed { asset, .. }
            | CompressionUpdate::Cancelled { asset, .. } => asset,
        }
    }

    /// Destination of the job that sent this update; identifies the job
    pub fn output(&self) -> &Path {
        match self {
            CompressionUpdate::Started { output, .. }
            | CompressionUpdate::Progress { output, .. }
            | CompressionUpdate::Succeeded { output, .. }
            | CompressionUpdate::Failed { output, .. }
            | CompressionUpdate::Cancelled { output, .. } => output,
        }
    }
}

/// Second encode pass that brings exported files down to the pipeline bitrate.
///
/// Every job shares the service's current cancellation token. `cancel` sets
/// it and installs a fresh one, so jobs started afterwards are unaffected.
pub struct CompressionService {
    compressor: Arc<dyn VideoCompressor>,
    settings: CompressionSettings,
    scratch: ScratchDir,
    file_type: VideoFileType,
    keep_intermediate: bool,
    cancel: CancellationToken,
}

impl CompressionService {
    pub fn new(compressor: Arc<dyn VideoCompressor>, scratch: ScratchDir, file_type: VideoFileType) -> Self {
        Self {
            compressor,
            settings: CompressionSettings::PIPELINE,
            scratch,
            file_type,
            keep_intermediate: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Keep the exported input file after compression
    pub fn keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    /// Token handed to jobs started from now on
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start compressing `input` in the background.
    ///
    /// Returns the destination path. Progress and the terminal event arrive
    /// on `events`. Takes ownership of `input`: it is deleted after the job
    /// ends unless intermediates are kept.
    ///
    /// # Arguments
    ///
    /// * `asset` - Asset the job belongs to, echoed in every update
    /// * `input` - Exported file to re-encode
    /// * `events` - Channel for progress and the terminal update
    pub fn compress<E>(&self, asset: AssetId, input: PathBuf, events: &UnboundedSender<E>) -> Result<PathBuf>
    where
        E: From<CompressionUpdate> + Send + 'static,
    {
        let destination = self.scratch.unique_path(self.file_type.extension())?;

        let compressor = Arc::clone(&self.compressor);
        let settings = self.settings;
        let cancel = self.cancel.clone();
        let keep_intermediate = self.keep_intermediate;
        let events = events.clone();
        let output = destination.clone();

        tokio::spawn(async move {
            info!("Compression started for {}", asset);
            let _ = events.send(
                CompressionUpdate::Started {
                    asset: asset.clone(),
                    output: output.clone(),
                }
                .into(),
            );

            let progress_events = events.clone();
            let progress_asset = asset.clone();
            let progress_output = output.clone();
            let progress = move |fraction: f64| {
                let _ = progress_events.send(
                    CompressionUpdate::Progress {
                        asset: progress_asset.clone(),
                        output: progress_output.clone(),
                        fraction,
                    }
                    .into(),
                );
            };

            let outcome = compressor.compress(&input, &output, &settings, &progress, &cancel).await;

            if !keep_intermediate {
                if let Err(e) = remove_if_exists(&input) {
                    warn!("Could not remove intermediate {:?}: {}", input, e);
                }
            }

            // Updates always carry the reserved destination; the coordinator
            // matches jobs on it
            let update = match outcome {
                CompressionOutcome::Succeeded(path) if path == output && output.exists() => {
                    debug!("Compressed {} to {:?}", asset, output);
                    CompressionUpdate::Succeeded { asset, output }
                }
                CompressionOutcome::Succeeded(path) => {
                    error!(
                        "Compressor reported success for {} at {:?}, expected {:?}",
                        asset, path, output
                    );
                    if path != output {
                        discard(&path);
                    }
                    discard(&output);
                    CompressionUpdate::Failed {
                        asset,
                        error: CompressionError::OutputMissing {
                            path: output.display().to_string(),
                        },
                        output,
                    }
                }
                CompressionOutcome::Failed(error) => {
                    error!("Compression error for {}: {}", asset, error);
                    discard(&output);
                    CompressionUpdate::Failed { asset, output, error }
                }
                CompressionOutcome::Cancelled => {
                    info!("Compression cancelled for {}", asset);
                    discard(&output);
                    CompressionUpdate::Cancelled { asset, output }
                }
            };

            let _ = events.send(update.into());
        });

        Ok(destination)
    }

    /// Ask every running job to stop
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
    }
}

fn discard(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        warn!("Could not remove {:?}: {}", path, e);
    }
}
