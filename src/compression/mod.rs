//! # Compression
//!
//! Re-encodes exported files to the pipeline bitrate. The encoder itself is
//! behind [`VideoCompressor`]; [`CompressionService`] owns temp files,
//! cancellation and event reporting.

pub mod compressor;
pub mod ffmpeg;
pub mod service;

pub use compressor::{CompressionOutcome, CompressionSettings, VideoCompressor, VideoQuality};
pub use ffmpeg::FfmpegCompressor;
pub use service::{CompressionService, CompressionUpdate};
