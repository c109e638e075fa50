//! # Video Tooling
//!
//! Shared ffmpeg plumbing used by the export and compression backends, and
//! the library-wide output file type.

pub mod ffmpeg;
pub mod types;

pub use ffmpeg::{FfmpegRunner, RunOutcome};
pub use types::VideoFileType;
