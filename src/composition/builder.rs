use tracing::{debug, warn};

use crate::composition::types::{CompositionPlan, CompositionTrack, CropSpecification, LayerInstruction};
use crate::error::{CompositionError, Result};
use crate::media::{AffineTransform, AssetId, AssetTrack, MediaSource, Point, Rect, Size, TimeRange, TrackKind};

/// Builds composition plans from loaded media.
///
/// Stateless: the same media and crop always give the same plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositionBuilder;

impl CompositionBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the plan that renders `crop.rect` of `source`, trimmed to
    /// `crop.max_duration`.
    ///
    /// A missing video track fails the request. A failed audio insertion is
    /// logged and the plan is built without audio.
    ///
    /// # Arguments
    ///
    /// * `asset_id` - Library identifier, used in the plan and in errors
    /// * `source` - Fetched media with its tracks and local location
    /// * `crop` - Rectangle in oriented pixels and the optional maximum duration
    pub fn build<S: MediaSource + ?Sized>(
        &self,
        asset_id: &AssetId,
        source: &S,
        crop: &CropSpecification,
    ) -> Result<CompositionPlan> {
        validate_crop(&crop.rect)?;

        let duration = effective_duration(crop.max_duration, source.duration());
        let time_range = TimeRange::from_zero(duration);

        let video_track = source
            .tracks(TrackKind::Video)?
            .into_iter()
            .next()
            .ok_or_else(|| CompositionError::NoVideoTrack { asset: asset_id.to_string() })?;

        let audio = match source.tracks(TrackKind::Audio)?.into_iter().next() {
            Some(audio_track) => match insert_time_range(&audio_track, time_range) {
                Ok(track) => Some(track),
                Err(e) => {
                    warn!("Continuing {} without audio: {}", asset_id, e);
                    None
                }
            },
            None => None,
        };

        let video = insert_time_range(&video_track, time_range)?;

        let (transform, orientation_offset) = correct_transform(
            &video_track.preferred_transform,
            video_track.natural_size,
            &crop.rect,
        );

        debug!(
            "Plan for {}: {:.2}s, render {}x{}, translation ({}, {}), audio: {}",
            asset_id,
            duration,
            crop.rect.size.width,
            crop.rect.size.height,
            transform.tx,
            transform.ty,
            audio.is_some()
        );

        Ok(CompositionPlan {
            asset_id: asset_id.clone(),
            source: source.location().to_path_buf(),
            time_range,
            video,
            audio,
            instruction: LayerInstruction {
                track_id: video.source_track_id,
                transform,
                at: 0.0,
            },
            orientation_offset,
            render_size: crop.rect.size,
        })
    }
}

/// Output duration: the asset duration, capped by `max_duration` if given
pub fn effective_duration(max_duration: Option<f64>, asset_duration: f64) -> f64 {
    match max_duration {
        Some(max) if max < asset_duration => max,
        _ => asset_duration,
    }
}

/// Transform that renders exactly `crop` at the origin.
///
/// Starts from the track's orientation. The translation is replaced by the
/// extent that went negative when the orientation was applied to the natural
/// size, then moved by the crop origin. Returns the transform and the
/// orientation offset it was derived from.
pub fn correct_transform(preferred: &AffineTransform, natural_size: Size, crop: &Rect) -> (AffineTransform, Point) {
    let oriented = natural_size.applying(preferred);
    let offset = Point::new(
        if oriented.width < 0.0 { oriented.width.abs() } else { 0.0 },
        if oriented.height < 0.0 { oriented.height.abs() } else { 0.0 },
    );

    let mut transform = *preferred;
    transform.tx = offset.x - crop.min_x();
    transform.ty = offset.y - crop.min_y();

    (transform, offset)
}

/// Place `range` of a source track at the start of the composition.
///
/// Only the part of `range` the track actually covers is used.
fn insert_time_range(track: &AssetTrack, range: TimeRange) -> std::result::Result<CompositionTrack, CompositionError> {
    if track.time_range.is_empty() {
        return Err(CompositionError::TrackInsertFailed {
            kind: track.kind.to_string(),
            reason: format!("track {} has no media", track.track_id),
        });
    }

    let segment = track.time_range.intersection(&range).ok_or_else(|| CompositionError::TrackInsertFailed {
        kind: track.kind.to_string(),
        reason: format!(
            "track {} covers {:.2}s-{:.2}s, requested {:.2}s-{:.2}s",
            track.track_id,
            track.time_range.start,
            track.time_range.end(),
            range.start,
            range.end()
        ),
    })?;

    Ok(CompositionTrack {
        kind: track.kind,
        source_track_id: track.track_id,
        segment,
        at: 0.0,
    })
}

fn validate_crop(rect: &Rect) -> std::result::Result<(), CompositionError> {
    let finite = [rect.origin.x, rect.origin.y, rect.size.width, rect.size.height]
        .iter()
        .all(|v| v.is_finite());

    if !finite || rect.is_empty() {
        return Err(CompositionError::InvalidCrop {
            details: format!("{:?}", rect),
        });
    }
    Ok(())
}
