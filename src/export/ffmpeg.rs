use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::composition::CompositionPlan;
use crate::error::Result;
use crate::export::session::{ExportSession, ExportStatus, Exporter, SessionState};
use crate::video::ffmpeg::{even_pixels, whole_pixels, FfmpegRunner, RunOutcome};

/// Renders composition plans with the ffmpeg command line.
///
/// ffmpeg applies the source's display rotation on decode, so the crop filter
/// works in oriented space, the same space the plan's crop lives in.
#[derive(Debug, Clone)]
pub struct FfmpegExporter {
    runner: FfmpegRunner,
    video_codec: String,
}

impl FfmpegExporter {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            video_codec: "libx264".to_string(),
        }
    }

    pub fn with_video_codec<S: Into<String>>(mut self, codec: S) -> Self {
        self.video_codec = codec.into();
        self
    }

    /// Command line for one export, progress flags excluded.
    ///
    /// Only the crop size is rounded down to even pixels for `yuv420p`; the
    /// origin keeps its whole-pixel position.
    ///
    /// # Arguments
    ///
    /// * `plan` - Crop, trim window and tracks of the export
    /// * `destination` - File ffmpeg writes, overwritten if present
    pub fn export_args(&self, plan: &CompositionPlan, destination: &Path) -> Vec<String> {
        let crop = plan.source_crop();
        let filter = format!(
            "crop={}:{}:{}:{}",
            even_pixels(crop.size.width),
            even_pixels(crop.size.height),
            whole_pixels(crop.origin.x),
            whole_pixels(crop.origin.y),
        );

        let mut args = vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", plan.video.segment.start),
            "-t".to_string(),
            format!("{:.3}", plan.duration()),
            "-i".to_string(),
            plan.source.display().to_string(),
            "-vf".to_string(),
            filter,
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ];

        if plan.has_audio() {
            args.extend(["-c:a".to_string(), "aac".to_string()]);
        } else {
            args.push("-an".to_string());
        }

        args.push(destination.display().to_string());
        args
    }
}

impl Exporter for FfmpegExporter {
    fn start(&self, plan: CompositionPlan, destination: PathBuf) -> Result<Arc<dyn ExportSession>> {
        let state = Arc::new(SessionState::new());
        let args = self.export_args(&plan, &destination);
        let runner = self.runner.clone();
        let duration = plan.duration();
        let session = Arc::clone(&state);

        tokio::spawn(async move {
            if session.cancel_token().is_cancelled() {
                session.transition(ExportStatus::Cancelled);
                return;
            }
            session.transition(ExportStatus::Running);
            debug!("Exporting {} to {:?}", plan.asset_id, destination);

            let progress_state = Arc::clone(&session);
            let result = runner
                .run(&args, duration, session.cancel_token(), move |fraction| {
                    progress_state.set_progress(fraction as f32)
                })
                .await;

            match result {
                Ok(RunOutcome::Finished) => {
                    session.complete(destination);
                }
                Ok(RunOutcome::Cancelled) => {
                    session.transition(ExportStatus::Cancelled);
                }
                Err(e) => {
                    error!("Export of {} failed: {}", plan.asset_id, e);
                    session.fail(e.to_string());
                }
            }
        });

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{CompositionBuilder, CropSpecification};
    use crate::media::{AffineTransform, AssetTrack, Rect, Size};
    use crate::test_support::media_with_tracks;

    fn plan(tracks: Vec<AssetTrack>) -> CompositionPlan {
        let media = media_with_tracks("clip", 10.0, tracks);
        let crop = CropSpecification::new(Rect::new(50.0, 50.0, 200.0, 200.0)).with_max_duration(4.0);
        CompositionBuilder::new().build(&media.asset.id, &media, &crop).unwrap()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let index = args.iter().position(|a| a == flag).unwrap();
        &args[index + 1]
    }

    #[test]
    fn test_args_crop_and_trim() {
        let plan = plan(vec![
            AssetTrack::video(1, 10.0, Size::new(400.0, 400.0), AffineTransform::IDENTITY),
            AssetTrack::audio(2, 10.0),
        ]);
        let exporter = FfmpegExporter::new(FfmpegRunner::new("ffmpeg"));
        let args = exporter.export_args(&plan, Path::new("/tmp/out.mp4"));

        assert_eq!(value_after(&args, "-vf"), "crop=200:200:50:50");
        assert_eq!(value_after(&args, "-t"), "4.000");
        assert_eq!(value_after(&args, "-c:a"), "aac");
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn test_args_without_audio_drop_audio_stream() {
        let plan = plan(vec![AssetTrack::video(
            1,
            10.0,
            Size::new(400.0, 400.0),
            AffineTransform::IDENTITY,
        )]);
        let exporter = FfmpegExporter::new(FfmpegRunner::new("ffmpeg")).with_video_codec("libx265");
        let args = exporter.export_args(&plan, Path::new("/tmp/out.mp4"));

        assert!(args.iter().any(|a| a == "-an"));
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert_eq!(value_after(&args, "-c:v"), "libx265");
    }

    #[test]
    fn test_odd_crop_origin_is_not_shifted() {
        let media = media_with_tracks(
            "clip",
            10.0,
            vec![AssetTrack::video(1, 10.0, Size::new(400.0, 400.0), AffineTransform::IDENTITY)],
        );
        let crop = CropSpecification::new(Rect::new(51.0, 33.0, 201.0, 199.0));
        let plan = CompositionBuilder::new().build(&media.asset.id, &media, &crop).unwrap();
        let exporter = FfmpegExporter::new(FfmpegRunner::new("ffmpeg"));
        let args = exporter.export_args(&plan, Path::new("/tmp/out.mp4"));

        assert_eq!(value_after(&args, "-vf"), "crop=200:198:51:33");
    }

    #[tokio::test]
    async fn test_missing_binary_fails_session() {
        let plan = plan(vec![AssetTrack::video(
            1,
            10.0,
            Size::new(400.0, 400.0),
            AffineTransform::IDENTITY,
        )]);
        let exporter = FfmpegExporter::new(FfmpegRunner::new("/nonexistent/ffmpeg-binary"));
        let session = exporter.start(plan, PathBuf::from("/tmp/never.mp4")).unwrap();

        let mut status = session.subscribe();
        while !status.borrow_and_update().is_terminal() {
            status.changed().await.unwrap();
        }
        assert_eq!(session.status(), ExportStatus::Failed);
        assert!(session.error().is_some());
    }
}
