//! # Export
//!
//! Export sessions render a [`CompositionPlan`](crate::composition::CompositionPlan)
//! into a temporary file. [`ExportSessionManager`] registers every session,
//! polls it, and hands completed files to compression.

pub mod ffmpeg;
pub mod manager;
pub mod monitor;
pub mod registry;
pub mod session;

pub use ffmpeg::FfmpegExporter;
pub use manager::{ExportResolution, ExportSessionManager};
pub use monitor::{spawn_monitor, ExportFinished, ExportUpdate, PollSettings};
pub use registry::{ExportJob, ExportRegistry, JobId};
pub use session::{ExportSession, ExportStatus, Exporter, SessionState};
