//! # Media Library Access
//!
//! Geometry and asset descriptions shared by every pipeline stage, plus the
//! [`MediaStore`] boundary the pipeline fetches assets through.

pub mod ffprobe;
pub mod geometry;
pub mod store;
pub mod types;

pub use ffprobe::FfprobeMediaStore;
pub use geometry::{AffineTransform, Point, Rect, Size};
pub use store::{DeliveryMode, DownloadProgress, FetchOptions, MediaStore};
pub use types::{AssetId, AssetTrack, MediaAsset, MediaSource, SourceMedia, TimeRange, TrackKind};
