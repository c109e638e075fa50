use std::path::PathBuf;

use crate::media::{AffineTransform, AssetId, Point, Rect, Size, TimeRange, TrackKind};

/// What the caller wants cut out of an asset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSpecification {
    /// Region to keep, in oriented asset space
    pub rect: Rect,

    /// Upper bound on output duration in seconds
    pub max_duration: Option<f64>,
}

impl CropSpecification {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            max_duration: None,
        }
    }

    pub fn with_max_duration(mut self, seconds: f64) -> Self {
        self.max_duration = Some(seconds);
        self
    }
}

/// A source track segment placed on the composition timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionTrack {
    pub kind: TrackKind,
    pub source_track_id: u32,

    /// Portion of the source track that is used
    pub segment: TimeRange,

    /// Where the segment starts on the composition timeline
    pub at: f64,
}

/// Layer instruction for the video track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerInstruction {
    pub track_id: u32,
    pub transform: AffineTransform,
    pub at: f64,
}

/// Everything an exporter needs to render one cropped, trimmed asset.
///
/// Built once per request and consumed by a single export.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPlan {
    pub asset_id: AssetId,
    pub source: PathBuf,

    /// Composition time range, always starting at zero
    pub time_range: TimeRange,

    pub video: CompositionTrack,
    pub audio: Option<CompositionTrack>,
    pub instruction: LayerInstruction,

    /// Translation that undoes rotation artifacts, before the crop offset
    pub orientation_offset: Point,

    /// Output frame size, equal to the crop size
    pub render_size: Size,
}

impl CompositionPlan {
    pub fn duration(&self) -> f64 {
        self.time_range.duration
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.instruction.transform
    }

    /// The region of the oriented source frame that ends up in the output
    pub fn source_crop(&self) -> Rect {
        let transform = self.transform();
        Rect {
            origin: Point::new(
                self.orientation_offset.x - transform.tx,
                self.orientation_offset.y - transform.ty,
            ),
            size: self.render_size,
        }
    }
}
