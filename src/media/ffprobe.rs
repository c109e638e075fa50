use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{FetchError, Result, VideoError};
use crate::media::geometry::{AffineTransform, Size};
use crate::media::store::{DownloadProgress, FetchOptions, MediaStore};
use crate::media::types::{AssetId, AssetTrack, MediaAsset, SourceMedia, TrackKind};

/// Media store backed by a directory of video files.
///
/// Asset identifiers are file names relative to the library root. Metadata is
/// read with `ffprobe`. Everything is local, so download progress jumps
/// straight to 1.0.
pub struct FfprobeMediaStore {
    root: PathBuf,
    ffprobe: PathBuf,
}

impl FfprobeMediaStore {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(root: P, ffprobe: Q) -> Self {
        Self {
            root: root.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Probe a single file and describe it as source media
    pub async fn probe(&self, id: &AssetId) -> Result<SourceMedia> {
        let path = self.root.join(id.as_str());
        if !path.is_file() {
            return Err(FetchError::AssetUnavailable { asset: id.to_string() }.into());
        }

        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(&path)
            .output()
            .await
            .map_err(|e| VideoError::ToolNotFound {
                tool: self.ffprobe.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(FetchError::ProbeFailed {
                path: path.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        parse_probe_output(&output.stdout, id, &path)
    }
}

#[async_trait]
impl MediaStore for FfprobeMediaStore {
    async fn fetch_video_asset(
        &self,
        id: &AssetId,
        options: FetchOptions,
        progress: DownloadProgress,
    ) -> Option<SourceMedia> {
        debug!("Fetching {} ({:?})", id, options.delivery_mode);

        match self.probe(id).await {
            Ok(media) => {
                progress(1.0);
                Some(media)
            }
            Err(e) => {
                warn!("Could not load {}: {}", id, e);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u32,
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Clockwise display rotation in degrees.
    ///
    /// The display matrix side data stores the counter-clockwise angle, so it
    /// is negated to match the legacy `rotate` tag.
    fn rotation(&self) -> i32 {
        if let Some(tag) = self.tags.rotate.as_deref().and_then(|r| r.trim().parse::<i32>().ok()) {
            return tag;
        }

        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .map(|r| -(r.round() as i32))
            .unwrap_or(0)
    }

    fn duration(&self) -> Option<f64> {
        parse_seconds(self.duration.as_deref())
    }
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok()).filter(|d| d.is_finite() && *d >= 0.0)
}

/// Turn `ffprobe -print_format json` output into source media
pub(crate) fn parse_probe_output(json: &[u8], id: &AssetId, path: &Path) -> Result<SourceMedia> {
    let probe: ProbeOutput = serde_json::from_slice(json).map_err(|e| FetchError::ProbeFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let container_duration = parse_seconds(probe.format.as_ref().and_then(|f| f.duration.as_deref()));

    let mut tracks = Vec::new();
    let mut natural_size = Size::default();
    let mut longest_stream = 0.0_f64;

    for stream in &probe.streams {
        let duration = stream.duration().or(container_duration).unwrap_or(0.0);
        let track_id = stream.index + 1;

        match stream.codec_type.as_deref() {
            Some("video") => {
                let size = Size::new(
                    stream.width.unwrap_or(0) as f64,
                    stream.height.unwrap_or(0) as f64,
                );
                if tracks.iter().all(|t: &AssetTrack| t.kind != TrackKind::Video) {
                    natural_size = size;
                }
                let transform = AffineTransform::quarter_turns(stream.rotation());
                tracks.push(AssetTrack::video(track_id, duration, size, transform));
            }
            Some("audio") => tracks.push(AssetTrack::audio(track_id, duration)),
            _ => continue,
        }

        longest_stream = longest_stream.max(duration);
    }

    let duration = container_duration.unwrap_or(longest_stream);

    Ok(SourceMedia {
        asset: MediaAsset {
            id: id.clone(),
            duration,
            natural_size,
        },
        location: path.to_path_buf(),
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT_PROBE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "duration": "12.5",
                "side_data_list": [{ "side_data_type": "Display Matrix", "rotation": -90 }]
            },
            { "index": 1, "codec_type": "audio", "duration": "12.4" },
            { "index": 2, "codec_type": "data" }
        ],
        "format": { "duration": "12.500000" }
    }"#;

    #[test]
    fn test_parse_portrait_video() {
        let id = AssetId::from("portrait.mov");
        let media = parse_probe_output(PORTRAIT_PROBE.as_bytes(), &id, Path::new("/lib/portrait.mov")).unwrap();

        assert_eq!(media.asset.duration, 12.5);
        assert_eq!(media.asset.natural_size, Size::new(1920.0, 1080.0));
        assert_eq!(media.tracks.len(), 2);

        let video = media.first_track(TrackKind::Video).unwrap();
        assert_eq!(video.preferred_transform, AffineTransform::quarter_turns(90));
        assert_eq!(video.track_id, 1);

        let audio = media.first_track(TrackKind::Audio).unwrap();
        assert_eq!(audio.time_range.duration, 12.4);
    }

    #[test]
    fn test_rotate_tag_wins_over_side_data() {
        let json = r#"{
            "streams": [{
                "index": 0, "codec_type": "video", "width": 640, "height": 480,
                "tags": { "rotate": "180" },
                "side_data_list": [{ "rotation": -90 }]
            }],
            "format": { "duration": "2.0" }
        }"#;

        let media = parse_probe_output(json.as_bytes(), &AssetId::from("x"), Path::new("x")).unwrap();
        let video = media.first_track(TrackKind::Video).unwrap();

        assert_eq!(video.preferred_transform, AffineTransform::quarter_turns(180));
        // Stream without its own duration falls back to the container
        assert_eq!(video.time_range.duration, 2.0);
    }

    #[test]
    fn test_garbage_is_probe_failure() {
        let result = parse_probe_output(b"not json", &AssetId::from("x"), Path::new("x"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FfprobeMediaStore::new(dir.path(), "ffprobe");

        let fetched = store
            .fetch_video_asset(&AssetId::from("missing.mp4"), FetchOptions::for_export(), Box::new(|_: f64| {}))
            .await;

        assert!(fetched.is_none());
    }
}
