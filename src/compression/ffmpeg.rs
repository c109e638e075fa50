use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::compression::compressor::{
    CompressionOutcome, CompressionProgress, CompressionSettings, VideoCompressor, VideoQuality,
};
use crate::error::CompressionError;
use crate::video::ffmpeg::{bitrate_arg, FfmpegRunner, RunOutcome};

/// Re-encodes with libx264 through the ffmpeg command line
pub struct FfmpegCompressor {
    runner: FfmpegRunner,
    ffprobe: PathBuf,
}

impl FfmpegCompressor {
    pub fn new(runner: FfmpegRunner, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ffprobe: ffprobe.into(),
        }
    }

    /// x264 preset for a quality level
    pub fn preset(quality: VideoQuality) -> &'static str {
        match quality {
            VideoQuality::VeryLow => "ultrafast",
            VideoQuality::Low => "veryfast",
            VideoQuality::Medium => "medium",
            VideoQuality::High => "slow",
            VideoQuality::VeryHigh => "veryslow",
        }
    }

    pub fn compress_args(source: &Path, destination: &Path, settings: &CompressionSettings) -> Vec<String> {
        let bitrate = bitrate_arg(settings.video_bitrate_mbps);
        vec![
            "-y".to_string(),
            "-i".to_string(),
            source.display().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            Self::preset(settings.quality).to_string(),
            "-b:v".to_string(),
            bitrate.clone(),
            "-maxrate".to_string(),
            bitrate,
            "-bufsize".to_string(),
            bitrate_arg(settings.video_bitrate_mbps * 2.0),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            destination.display().to_string(),
        ]
    }

    /// Duration of the input, used to scale progress
    async fn input_duration(&self, source: &Path) -> f64 {
        let output = tokio::process::Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(source)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .trim()
                .parse::<f64>()
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

#[async_trait]
impl VideoCompressor for FfmpegCompressor {
    async fn compress(
        &self,
        source: &Path,
        destination: &Path,
        settings: &CompressionSettings,
        progress: CompressionProgress<'_>,
        cancel: &CancellationToken,
    ) -> CompressionOutcome {
        let duration = self.input_duration(source).await;
        debug!("Compressing {:?} ({:.2}s) to {:?}", source, duration, destination);

        let args = Self::compress_args(source, destination, settings);
        match self.runner.run(&args, duration, cancel, |fraction| progress(fraction)).await {
            Ok(RunOutcome::Finished) => CompressionOutcome::Succeeded(destination.to_path_buf()),
            Ok(RunOutcome::Cancelled) => CompressionOutcome::Cancelled,
            Err(e) => CompressionOutcome::Failed(CompressionError::Failed { reason: e.to_string() }),
        }
    }
}
