//! In-memory stand-ins for the media store, exporter and compressor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use crate::cancel::CancellationToken;
use crate::composition::CompositionPlan;
use crate::compression::compressor::CompressionProgress;
use crate::compression::{CompressionOutcome, CompressionSettings, VideoCompressor};
use crate::error::{CompressionError, Result};
use crate::export::{ExportSession, ExportStatus, Exporter, SessionState};
use crate::media::{
    AssetId, AssetTrack, DownloadProgress, FetchOptions, MediaAsset, MediaStore, Size, SourceMedia, TrackKind,
};

/// Media named `name` under a fake library root
pub fn media_with_tracks(name: &str, duration: f64, tracks: Vec<AssetTrack>) -> SourceMedia {
    let natural_size = tracks
        .iter()
        .find(|t| t.kind == TrackKind::Video)
        .map(|t| t.natural_size)
        .unwrap_or_default();

    SourceMedia {
        asset: MediaAsset {
            id: AssetId::from(name),
            duration,
            natural_size,
        },
        location: PathBuf::from("/library").join(name),
        tracks,
    }
}

/// Holds fetches until opened
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn open(&self) {
        self.0.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[derive(Default)]
pub struct FakeStore {
    assets: HashMap<AssetId, SourceMedia>,
    gate: Option<Gate>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, media: SourceMedia) -> Self {
        self.assets.insert(media.asset.id.clone(), media);
        self
    }

    /// Make every fetch wait until the returned gate is opened
    pub fn gated(mut self) -> (Self, Gate) {
        let gate = Gate(Arc::new(Semaphore::new(0)));
        self.gate = Some(gate.clone());
        (self, gate)
    }
}

#[async_trait]
impl MediaStore for FakeStore {
    async fn fetch_video_asset(
        &self,
        id: &AssetId,
        _options: FetchOptions,
        progress: DownloadProgress,
    ) -> Option<SourceMedia> {
        if let Some(gate) = &self.gate {
            let _permit = gate.0.acquire().await.ok()?;
        }

        let media = self.assets.get(id).cloned()?;
        progress(0.5);
        progress(1.0);
        Some(media)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeExportMode {
    /// Writes the destination and completes
    Complete,
    Fail,
    /// Runs until cancelled
    Hang,
}

pub struct FakeExporter {
    mode: FakeExportMode,
    sessions: Mutex<Vec<Arc<SessionState>>>,
}

impl FakeExporter {
    pub fn new(mode: FakeExportMode) -> Self {
        Self {
            mode,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn starts(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn sessions(&self) -> Vec<Arc<SessionState>> {
        self.sessions.lock().unwrap().clone()
    }
}

impl Exporter for FakeExporter {
    fn start(&self, _plan: CompositionPlan, destination: PathBuf) -> Result<Arc<dyn ExportSession>> {
        let state = Arc::new(SessionState::new());
        self.sessions.lock().unwrap().push(Arc::clone(&state));

        let mode = self.mode;
        let session = Arc::clone(&state);
        tokio::spawn(async move {
            session.transition(ExportStatus::Running);
            match mode {
                FakeExportMode::Complete => {
                    session.set_progress(0.5);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    std::fs::write(&destination, b"exported").unwrap();
                    session.complete(destination);
                }
                FakeExportMode::Fail => {
                    session.fail("encoder gave up");
                }
                FakeExportMode::Hang => loop {
                    if session.cancel_token().is_cancelled() {
                        session.transition(ExportStatus::Cancelled);
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                },
            }
        });

        Ok(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeCompressorMode {
    Succeed,
    /// Writes next to the destination and reports that path instead
    SucceedElsewhere,
    Fail,
    WaitForCancel,
}

pub struct FakeCompressor {
    mode: FakeCompressorMode,
    started: Notify,
    calls: AtomicUsize,
    last: Mutex<Option<(PathBuf, CompressionSettings)>>,
}

impl FakeCompressor {
    pub fn new(mode: FakeCompressorMode) -> Self {
        Self {
            mode,
            started: Notify::new(),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// Wait until a compression has started
    pub async fn started(&self) {
        self.started.notified().await
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_source(&self) -> Option<PathBuf> {
        self.last.lock().unwrap().as_ref().map(|(source, _)| source.clone())
    }

    pub fn last_settings(&self) -> Option<CompressionSettings> {
        self.last.lock().unwrap().as_ref().map(|(_, settings)| *settings)
    }
}

#[async_trait]
impl VideoCompressor for FakeCompressor {
    async fn compress(
        &self,
        source: &Path,
        destination: &Path,
        settings: &CompressionSettings,
        progress: CompressionProgress<'_>,
        cancel: &CancellationToken,
    ) -> CompressionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((source.to_path_buf(), *settings));
        self.started.notify_one();
        progress(0.5);

        match self.mode {
            FakeCompressorMode::Succeed => {
                std::fs::write(destination, b"compressed").unwrap();
                progress(1.0);
                CompressionOutcome::Succeeded(destination.to_path_buf())
            }
            FakeCompressorMode::SucceedElsewhere => {
                let elsewhere = destination.with_extension("other.mp4");
                std::fs::write(&elsewhere, b"compressed").unwrap();
                CompressionOutcome::Succeeded(elsewhere)
            }
            FakeCompressorMode::Fail => CompressionOutcome::Failed(CompressionError::Failed {
                reason: "fake failure".to_string(),
            }),
            FakeCompressorMode::WaitForCancel => loop {
                if cancel.is_cancelled() {
                    return CompressionOutcome::Cancelled;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            },
        }
    }
}

#[test]
fn test_media_with_tracks_uses_video_size() {
    let media = media_with_tracks(
        "clip.mov",
        2.0,
        vec![
            AssetTrack::audio(1, 2.0),
            AssetTrack::video(2, 2.0, Size::new(1280.0, 720.0), crate::media::AffineTransform::IDENTITY),
        ],
    );
    assert_eq!(media.asset.natural_size, Size::new(1280.0, 720.0));
    assert_eq!(media.location, PathBuf::from("/library/clip.mov"));
}
