//! # clipcrop
//!
//! Fetch videos from a media library, crop and trim them, export the result
//! and re-compress it to a small, predictable bitrate.
//!
//! Each request goes through four stages in order: download, composition,
//! export and compression. Requests for different assets run concurrently.
//! Progress from every stage is folded into one value for the whole batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clipcrop::{
//!     composition::CropSpecification,
//!     compression::FfmpegCompressor,
//!     config::Config,
//!     export::FfmpegExporter,
//!     media::{FfprobeMediaStore, Rect},
//!     pipeline::{Coordinator, PipelineOutcome},
//!     progress::TracingProgressSink,
//!     video::FfmpegRunner,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let runner = FfmpegRunner::new(&config.tools.ffmpeg);
//!
//! let (handle, _task) = Coordinator::spawn(
//!     &config,
//!     Arc::new(FfprobeMediaStore::new("library/", &config.tools.ffprobe)),
//!     Arc::new(FfmpegExporter::new(runner.clone())),
//!     Arc::new(FfmpegCompressor::new(runner, &config.tools.ffprobe)),
//!     Arc::new(TracingProgressSink::new()),
//! );
//!
//! handle.begin_batch(1)?;
//! let crop = CropSpecification::new(Rect::new(0.0, 0.0, 720.0, 720.0)).with_max_duration(15.0);
//! let reply = handle.fetch_and_crop("holiday.mov", crop).await?;
//!
//! if let Ok(PipelineOutcome::Completed(path)) = reply.await {
//!     println!("Compressed clip at {:?}", path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`media`] - Geometry, asset types and the media store boundary
//! - [`composition`] - Crop and trim plans
//! - [`export`] - Export sessions, their registry and polling
//! - [`compression`] - Second encode pass at the pipeline bitrate
//! - [`progress`] - Combined progress across stages and assets
//! - [`pipeline`] - Per-request state machines and the coordinator task
//! - [`config`] - Configuration management
//!
//! ## Plugging in a media library
//!
//! Anything that can hand out local media files can back the pipeline by
//! implementing [`MediaStore`](media::MediaStore):
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use clipcrop::media::{AssetId, DownloadProgress, FetchOptions, MediaStore, SourceMedia};
//!
//! struct CloudLibrary;
//!
//! #[async_trait]
//! impl MediaStore for CloudLibrary {
//!     async fn fetch_video_asset(
//!         &self,
//!         id: &AssetId,
//!         options: FetchOptions,
//!         progress: DownloadProgress,
//!     ) -> Option<SourceMedia> {
//!         // Download, reporting progress, then describe the local file
//!         None
//!     }
//! }
//! ```

pub mod cancel;
pub mod composition;
pub mod compression;
pub mod config;
pub mod error;
pub mod export;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod scratch;
pub mod video;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use crate::{
    cancel::CancellationToken,
    composition::CropSpecification,
    config::Config,
    error::{PipelineError, Result},
    pipeline::{Coordinator, PipelineHandle, PipelineOutcome},
};
