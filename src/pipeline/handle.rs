use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{oneshot, watch};

use crate::composition::CropSpecification;
use crate::error::{PipelineError, Result};
use crate::media::AssetId;
use crate::pipeline::coordinator::Command;
use crate::pipeline::outcome::PipelineOutcome;

/// Caller side of the pipeline.
///
/// Cheap to clone. The coordinator stops accepting requests once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    commands: UnboundedSender<Command>,
    progress: watch::Receiver<f32>,
}

impl PipelineHandle {
    pub(crate) fn new(commands: UnboundedSender<Command>, progress: watch::Receiver<f32>) -> Self {
        Self { commands, progress }
    }

    /// Start a new batch of `total_selected` videos; progress restarts at 0
    pub fn begin_batch(&self, total_selected: usize) -> Result<()> {
        self.send(Command::BeginBatch { total_selected })
    }

    /// Fetch `asset`, crop and trim it, export and compress it.
    ///
    /// Returns once the request is accepted. The receiver yields the final
    /// outcome; with suppressed silent outcomes it closes without a value
    /// when the request is cancelled or the asset is unavailable.
    pub async fn fetch_and_crop<A: Into<AssetId>>(
        &self,
        asset: A,
        crop: CropSpecification,
    ) -> Result<oneshot::Receiver<PipelineOutcome>> {
        let (reply, outcome) = oneshot::channel();
        let (accepted, accepted_rx) = oneshot::channel();

        self.send(Command::Submit {
            asset: asset.into(),
            crop,
            reply,
            accepted,
        })?;

        accepted_rx.await.map_err(|_| PipelineError::CoordinatorStopped)??;
        Ok(outcome)
    }

    /// Cancel every request in flight, returning how many there were
    pub async fn force_cancel_all(&self) -> Result<usize> {
        let (done, done_rx) = oneshot::channel();
        self.send(Command::CancelAll { done })?;
        done_rx.await.map_err(|_| PipelineError::CoordinatorStopped)
    }

    /// Stop accepting requests; the coordinator exits once in-flight
    /// requests resolve
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Combined progress of the current batch
    pub fn progress(&self) -> watch::Receiver<f32> {
        self.progress.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PipelineError::CoordinatorStopped)
    }
}
