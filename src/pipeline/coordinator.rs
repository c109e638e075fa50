use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::composition::{CompositionBuilder, CropSpecification};
use crate::compression::{CompressionService, CompressionUpdate, VideoCompressor};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::export::{ExportResolution, ExportSessionManager, ExportUpdate, Exporter, JobId};
use crate::media::{AssetId, DownloadProgress, FetchOptions, MediaStore, SourceMedia};
use crate::pipeline::handle::PipelineHandle;
use crate::pipeline::outcome::{PipelineOutcome, SilentOutcomes};
use crate::pipeline::state::{AssetStage, StageEvent};
use crate::progress::{ProgressAggregator, ProgressSink, Stage};
use crate::scratch::{remove_if_exists, ScratchDir};
use crate::video::VideoFileType;

/// Requests from handles
#[derive(Debug)]
pub(crate) enum Command {
    Submit {
        asset: AssetId,
        crop: CropSpecification,
        reply: oneshot::Sender<PipelineOutcome>,
        accepted: oneshot::Sender<Result<()>>,
    },
    BeginBatch {
        total_selected: usize,
    },
    CancelAll {
        done: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Identifies one accepted request, so a fetch started for a cancelled
/// request never feeds a later request for the same asset
pub(crate) type RequestId = u64;

/// Reports from background work
#[derive(Debug)]
pub(crate) enum Event {
    Download {
        request: RequestId,
        asset: AssetId,
        fraction: f64,
    },
    Fetched {
        request: RequestId,
        asset: AssetId,
        media: Option<SourceMedia>,
    },
    Export(ExportUpdate),
    Compression(CompressionUpdate),
}

impl From<ExportUpdate> for Event {
    fn from(update: ExportUpdate) -> Self {
        Event::Export(update)
    }
}

impl From<CompressionUpdate> for Event {
    fn from(update: CompressionUpdate) -> Self {
        Event::Compression(update)
    }
}

/// One caller request in flight
struct AssetPipeline {
    request: RequestId,
    stage: AssetStage,
    crop: CropSpecification,
    reply: Option<oneshot::Sender<PipelineOutcome>>,
}

impl AssetPipeline {
    fn advance(&mut self, event: StageEvent) -> bool {
        match self.stage.next(event) {
            Some(next) => {
                self.stage = next;
                true
            }
            None => false,
        }
    }

    fn is_waiting_for(&self, request: RequestId) -> bool {
        self.request == request && self.stage == AssetStage::Downloading
    }

    fn is_exporting(&self, job: JobId) -> bool {
        matches!(self.stage, AssetStage::Exporting { job: current } if current == job)
    }
}

/// The coordination context.
///
/// A single task owns the progress maps, the export registry and every
/// in-flight request. Background work only talks to it through `Event`s.
pub struct Coordinator {
    store: Arc<dyn MediaStore>,
    builder: CompositionBuilder,
    exports: ExportSessionManager,
    scratch: ScratchDir,
    file_type: VideoFileType,
    progress: ProgressAggregator,
    sink: Arc<dyn ProgressSink>,
    progress_tx: watch::Sender<f32>,
    label: String,
    silent: SilentOutcomes,
    pipelines: HashMap<AssetId, AssetPipeline>,
    batch_total: usize,
    batch_submitted: usize,
    next_request: RequestId,
    events_tx: UnboundedSender<Event>,
}

impl Coordinator {
    /// Start the coordination task.
    ///
    /// The task runs until every handle is dropped or `shutdown` is called,
    /// and all requests in flight at that point have resolved.
    ///
    /// # Arguments
    ///
    /// * `config` - Scratch location, polling, silent outcome policy and progress label
    /// * `store` - Media library assets are fetched from
    /// * `exporter` - Renders composition plans
    /// * `compressor` - Second encode pass at the pipeline bitrate
    /// * `sink` - Receives the combined progress after every change
    pub fn spawn(
        config: &Config,
        store: Arc<dyn MediaStore>,
        exporter: Arc<dyn Exporter>,
        compressor: Arc<dyn VideoCompressor>,
        sink: Arc<dyn ProgressSink>,
    ) -> (PipelineHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = watch::channel(0.0);

        let scratch = config.video.scratch();
        let file_type = config.video.file_type;
        let compression = CompressionService::new(compressor, scratch.clone(), file_type)
            .keep_intermediate(config.compression.keep_intermediate);
        let exports = ExportSessionManager::new(exporter, compression, config.export.poll_settings());

        let coordinator = Coordinator {
            store,
            builder: CompositionBuilder::new(),
            exports,
            scratch,
            file_type,
            progress: ProgressAggregator::new(),
            sink,
            progress_tx,
            label: config.progress.label.clone(),
            silent: config.pipeline.silent_outcomes,
            pipelines: HashMap::new(),
            batch_total: 0,
            batch_submitted: 0,
            next_request: 0,
            events_tx,
        };

        let task = tokio::spawn(coordinator.run(commands_rx, events_rx));
        (PipelineHandle::new(commands_tx, progress_rx), task)
    }

    async fn run(mut self, mut commands: UnboundedReceiver<Command>, mut events: UnboundedReceiver<Event>) {
        info!("Pipeline coordinator started");
        let mut accepting = true;
        let mut commands_open = true;

        loop {
            if !accepting && self.pipelines.is_empty() {
                break;
            }

            // Commands are still read while draining so cancellation keeps working
            tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Shutdown) => {
                        if accepting {
                            debug!("Shutting down, draining {} pipeline(s)", self.pipelines.len());
                        }
                        accepting = false;
                    }
                    Some(command) => self.handle_command(command, accepting),
                    None => {
                        debug!("All handles dropped, draining {} pipeline(s)", self.pipelines.len());
                        commands_open = false;
                        accepting = false;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }

        info!("Pipeline coordinator stopped");
    }

    fn handle_command(&mut self, command: Command, accepting: bool) {
        match command {
            Command::Submit {
                asset,
                crop,
                reply,
                accepted,
            } => {
                let result = if accepting {
                    self.submit(asset, crop, reply)
                } else {
                    debug!("Refusing {} while shutting down", asset);
                    Err(PipelineError::CoordinatorStopped)
                };
                let _ = accepted.send(result);
            }
            Command::BeginBatch { total_selected } => {
                debug!("New batch of {} video(s)", total_selected);
                self.progress.reset();
                self.batch_total = total_selected;
                self.batch_submitted = self.pipelines.len();
                self.publish();
            }
            Command::CancelAll { done } => {
                let cancelled = self.cancel_all();
                let _ = done.send(cancelled);
            }
            Command::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Download {
                request,
                asset,
                fraction,
            } => {
                let downloading = self.pipelines.get(&asset).map_or(false, |p| p.is_waiting_for(request));
                if downloading {
                    self.progress.record(Stage::Download, &asset, fraction);
                    self.publish();
                }
            }
            Event::Fetched { request, asset, media } => self.on_fetched(request, asset, media),
            Event::Export(ExportUpdate::Progress { job, asset, fraction }) => {
                if self.pipelines.get(&asset).map_or(false, |p| p.is_exporting(job)) {
                    self.progress.record(Stage::Export, &asset, fraction);
                    self.publish();
                }
            }
            Event::Export(ExportUpdate::Finished(finished)) => {
                let asset = finished.asset.clone();
                let current = self.pipelines.get(&asset).map_or(false, |p| p.is_exporting(finished.job));
                if !current {
                    self.exports.discard(finished);
                    return;
                }

                match self.exports.finish(finished, &self.events_tx) {
                    ExportResolution::Compressing { destination } => {
                        self.progress.record(Stage::Export, &asset, 1.0);
                        if let Some(pipeline) = self.pipelines.get_mut(&asset) {
                            pipeline.advance(StageEvent::Exported { output: destination });
                        }
                        self.publish();
                    }
                    ExportResolution::Failed(e) => {
                        self.finish(&asset, StageEvent::Failed, PipelineOutcome::Failed(e))
                    }
                    ExportResolution::Cancelled => {
                        self.finish(&asset, StageEvent::Cancel, PipelineOutcome::Cancelled)
                    }
                    ExportResolution::Unknown => {}
                }
            }
            Event::Compression(update) => self.on_compression(update),
        }
    }

    fn submit(
        &mut self,
        asset: AssetId,
        crop: CropSpecification,
        reply: oneshot::Sender<PipelineOutcome>,
    ) -> Result<()> {
        if self.pipelines.contains_key(&asset) {
            warn!("Rejecting duplicate request for {}", asset);
            return Err(PipelineError::AlreadyInFlight { asset: asset.to_string() });
        }
        if self.exports.is_exporting(&asset) {
            // A cancelled export for this asset has not ended yet
            warn!("Rejecting request for {} until its previous export ends", asset);
            return Err(PipelineError::AlreadyInFlight { asset: asset.to_string() });
        }

        let request = self.next_request;
        self.next_request += 1;

        let mut pipeline = AssetPipeline {
            request,
            stage: AssetStage::Idle,
            crop,
            reply: Some(reply),
        };
        pipeline.advance(StageEvent::FetchRequested);
        self.pipelines.insert(asset.clone(), pipeline);
        self.batch_submitted += 1;

        info!("Fetching {}", asset);
        self.progress.record(Stage::Download, &asset, 0.0);
        self.spawn_fetch(request, asset);
        self.publish();
        Ok(())
    }

    fn spawn_fetch(&self, request: RequestId, asset: AssetId) {
        let store = Arc::clone(&self.store);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let progress_events = events.clone();
            let progress_asset = asset.clone();
            let progress: DownloadProgress = Box::new(move |fraction: f64| {
                let _ = progress_events.send(Event::Download {
                    request,
                    asset: progress_asset.clone(),
                    fraction,
                });
            });

            let media = store.fetch_video_asset(&asset, FetchOptions::for_export(), progress).await;
            let _ = events.send(Event::Fetched { request, asset, media });
        });
    }

    fn on_fetched(&mut self, request: RequestId, asset: AssetId, media: Option<SourceMedia>) {
        let Some(pipeline) = self.pipelines.get(&asset) else {
            debug!("Fetch result for {} arrived after the request ended", asset);
            return;
        };
        if !pipeline.is_waiting_for(request) {
            debug!("Ignoring stale fetch result for {} while {}", asset, pipeline.stage);
            return;
        }
        let crop = pipeline.crop;

        let Some(media) = media else {
            warn!("Asset {} is not available", asset);
            self.finish(&asset, StageEvent::Missing, PipelineOutcome::Unavailable);
            return;
        };

        if let Some(pipeline) = self.pipelines.get_mut(&asset) {
            pipeline.advance(StageEvent::Fetched);
        }
        self.progress.record(Stage::Download, &asset, 1.0);

        match self.start_export(&asset, &media, &crop) {
            Ok(job) => {
                if let Some(pipeline) = self.pipelines.get_mut(&asset) {
                    pipeline.advance(StageEvent::ExportStarted { job });
                }
                self.publish();
            }
            Err(e) => {
                error!("Could not export {}: {}", asset, e);
                self.finish(&asset, StageEvent::Failed, PipelineOutcome::Failed(e));
            }
        }
    }

    fn start_export(&mut self, asset: &AssetId, media: &SourceMedia, crop: &CropSpecification) -> Result<JobId> {
        let plan = self.builder.build(asset, media, crop)?;
        let destination = self.scratch.unique_path(self.file_type.extension())?;
        self.exports.start_export(plan, destination, &self.events_tx)
    }

    fn on_compression(&mut self, update: CompressionUpdate) {
        let asset = update.asset().clone();
        let owned = self.pipelines.get(&asset).map_or(false, |p| {
            matches!(&p.stage, AssetStage::Compressing { output } if output.as_path() == update.output())
        });

        if !owned {
            if let CompressionUpdate::Succeeded { output, .. } = &update {
                debug!("Removing unclaimed compression output {:?}", output);
                if let Err(e) = remove_if_exists(output) {
                    warn!("Could not remove {:?}: {}", output, e);
                }
            }
            return;
        }

        match update {
            CompressionUpdate::Started { .. } => debug!("Compressing {}", asset),
            CompressionUpdate::Progress { fraction, .. } => {
                self.progress.record(Stage::Compress, &asset, fraction);
                self.publish();
            }
            CompressionUpdate::Succeeded { output, .. } => {
                self.progress.record(Stage::Compress, &asset, 1.0);
                self.finish(&asset, StageEvent::Compressed, PipelineOutcome::Completed(output));
            }
            CompressionUpdate::Failed { error, .. } => {
                self.finish(&asset, StageEvent::Failed, PipelineOutcome::Failed(error.into()))
            }
            CompressionUpdate::Cancelled { .. } => {
                self.finish(&asset, StageEvent::Cancel, PipelineOutcome::Cancelled)
            }
        }
    }

    /// End every request, then cancel exports and compression.
    ///
    /// Requests resolve right away; background work may keep running for a
    /// while and its results are thrown away.
    fn cancel_all(&mut self) -> usize {
        let assets: Vec<AssetId> = self.pipelines.keys().cloned().collect();
        for asset in &assets {
            self.finish(asset, StageEvent::Cancel, PipelineOutcome::Cancelled);
        }

        let sessions = self.exports.force_cancel_all();
        info!("Cancelled {} request(s), {} export session(s)", assets.len(), sessions);
        assets.len()
    }

    /// Move a request to its terminal stage and reply to the caller
    fn finish(&mut self, asset: &AssetId, event: StageEvent, outcome: PipelineOutcome) {
        let Some(mut pipeline) = self.pipelines.remove(asset) else {
            return;
        };

        let from = pipeline.stage.clone();
        if !pipeline.advance(event) {
            warn!("{}: unexpected end of pipeline while {}", asset, from);
        }
        info!("{} {} -> {}", asset, from, pipeline.stage);

        let completed = matches!(outcome, PipelineOutcome::Completed(_));
        self.progress.retire(asset, completed);
        self.publish();

        let Some(reply) = pipeline.reply.take() else {
            return;
        };
        if outcome.is_silent() && self.silent == SilentOutcomes::Suppress {
            debug!("Not reporting {:?} for {}", outcome, asset);
            return;
        }
        if reply.send(outcome).is_err() {
            debug!("Caller stopped waiting for {}", asset);
        }
    }

    fn publish(&self) {
        let total = self.batch_total.max(self.batch_submitted);
        let fraction = self.progress.combined_fraction(total) as f32;
        self.progress_tx.send_replace(fraction);
        self.sink.update_progress(fraction, &self.label);
    }
}
