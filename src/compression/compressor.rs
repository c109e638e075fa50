use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::CompressionError;

/// Quality preset understood by compressors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoQuality {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Settings for a single compression run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    pub quality: VideoQuality,
    pub video_bitrate_mbps: f64,
}

impl CompressionSettings {
    /// Fixed policy of the export pipeline: medium quality at 1 Mbps
    pub const PIPELINE: CompressionSettings = CompressionSettings {
        quality: VideoQuality::Medium,
        video_bitrate_mbps: 1.0,
    };
}

/// Terminal result of a compressor run
#[derive(Debug)]
pub enum CompressionOutcome {
    Succeeded(PathBuf),
    Failed(CompressionError),
    Cancelled,
}

/// Progress callback, called with fractions in `[0, 1]`
pub type CompressionProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Opaque video re-encoder.
///
/// Implementations write `destination` and must check `cancel` between
/// units of work. Cancellation is best-effort: a unit already in progress
/// may finish first.
#[async_trait]
pub trait VideoCompressor: Send + Sync {
    async fn compress(
        &self,
        source: &Path,
        destination: &Path,
        settings: &CompressionSettings,
        progress: CompressionProgress<'_>,
        cancel: &CancellationToken,
    ) -> CompressionOutcome;
}
