use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::media::geometry::{AffineTransform, Size};

/// Stable identifier of an asset in the media store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A video item as the media store describes it.
///
/// The pipeline only reads this; the store owns the media.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub id: AssetId,

    /// Duration in seconds
    pub duration: f64,

    /// Native pixel size before orientation is applied
    pub natural_size: Size,
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => f.write_str("video"),
            TrackKind::Audio => f.write_str("audio"),
        }
    }
}

/// Half-open time interval `[start, start + duration)` in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// Range starting at zero
    pub fn from_zero(duration: f64) -> Self {
        Self { start: 0.0, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn is_empty(&self) -> bool {
        !(self.duration > 0.0)
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }

    /// Overlap of two ranges, `None` when they do not overlap
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        (end > start).then(|| TimeRange::new(start, end - start))
    }
}

/// One track of a loaded asset
#[derive(Debug, Clone, PartialEq)]
pub struct AssetTrack {
    pub track_id: u32,
    pub kind: TrackKind,

    /// Where the track has media, in asset time
    pub time_range: TimeRange,

    /// Pixel size for video tracks, zero for audio
    pub natural_size: Size,

    /// Orientation transform recorded by the camera
    pub preferred_transform: AffineTransform,
}

impl AssetTrack {
    pub fn video(track_id: u32, duration: f64, natural_size: Size, preferred_transform: AffineTransform) -> Self {
        Self {
            track_id,
            kind: TrackKind::Video,
            time_range: TimeRange::from_zero(duration),
            natural_size,
            preferred_transform,
        }
    }

    pub fn audio(track_id: u32, duration: f64) -> Self {
        Self {
            track_id,
            kind: TrackKind::Audio,
            time_range: TimeRange::from_zero(duration),
            natural_size: Size::default(),
            preferred_transform: AffineTransform::IDENTITY,
        }
    }
}

/// Read access to the tracks of a loaded asset.
///
/// Track access is fallible because some stores resolve tracks lazily.
pub trait MediaSource {
    /// Location of the underlying media file
    fn location(&self) -> &Path;

    /// Duration in seconds
    fn duration(&self) -> f64;

    /// All tracks of the given kind, in store order
    fn tracks(&self, kind: TrackKind) -> Result<Vec<AssetTrack>>;
}

/// Fully available media handed back by a store
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMedia {
    pub asset: MediaAsset,
    pub location: PathBuf,
    pub tracks: Vec<AssetTrack>,
}

impl SourceMedia {
    pub fn first_track(&self, kind: TrackKind) -> Option<&AssetTrack> {
        self.tracks.iter().find(|track| track.kind == kind)
    }
}

impl MediaSource for SourceMedia {
    fn location(&self) -> &Path {
        &self.location
    }

    fn duration(&self) -> f64 {
        self.asset.duration
    }

    fn tracks(&self, kind: TrackKind) -> Result<Vec<AssetTrack>> {
        Ok(self.tracks.iter().filter(|t| t.kind == kind).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_intersection() {
        let a = TimeRange::from_zero(10.0);
        let b = TimeRange::new(4.0, 10.0);

        assert_eq!(a.intersection(&b), Some(TimeRange::new(4.0, 6.0)));
        assert_eq!(a.intersection(&TimeRange::new(10.0, 1.0)), None);
        assert!(a.contains(0.0));
        assert!(!a.contains(10.0));
    }

    #[test]
    fn test_source_media_track_lookup() {
        let media = SourceMedia {
            asset: MediaAsset {
                id: AssetId::from("clip.mov"),
                duration: 3.0,
                natural_size: Size::new(640.0, 480.0),
            },
            location: PathBuf::from("/tmp/clip.mov"),
            tracks: vec![
                AssetTrack::audio(2, 3.0),
                AssetTrack::video(1, 3.0, Size::new(640.0, 480.0), AffineTransform::IDENTITY),
            ],
        };

        assert_eq!(media.first_track(TrackKind::Video).map(|t| t.track_id), Some(1));
        assert_eq!(media.tracks(TrackKind::Audio).unwrap().len(), 1);
        assert_eq!(media.asset.id.to_string(), "clip.mov");
    }
}
