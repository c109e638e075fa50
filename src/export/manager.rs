use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::composition::CompositionPlan;
use crate::compression::{CompressionService, CompressionUpdate};
use crate::error::{ExportError, PipelineError, Result};
use crate::export::monitor::{spawn_monitor, ExportFinished, ExportUpdate, PollSettings};
use crate::export::registry::{ExportJob, ExportRegistry, JobId};
use crate::export::session::{ExportStatus, Exporter};
use crate::media::AssetId;
use crate::scratch::remove_if_exists;

/// What happened to an export once it ended
#[derive(Debug)]
pub enum ExportResolution {
    /// Export succeeded and compression was started into `destination`
    Compressing { destination: PathBuf },
    Failed(PipelineError),
    Cancelled,
    /// The job was not registered (already resolved)
    Unknown,
}

/// Drives export sessions and hands finished exports to compression.
///
/// Lives on the coordinator; all registry changes happen there.
pub struct ExportSessionManager {
    exporter: Arc<dyn Exporter>,
    registry: ExportRegistry,
    compression: CompressionService,
    poll: PollSettings,
}

impl ExportSessionManager {
    pub fn new(exporter: Arc<dyn Exporter>, compression: CompressionService, poll: PollSettings) -> Self {
        Self {
            exporter,
            registry: ExportRegistry::new(),
            compression,
            poll,
        }
    }

    /// Start exporting `plan` into `destination` and begin polling it
    ///
    /// # Arguments
    ///
    /// * `plan` - Composition to render; its asset must not have an active export
    /// * `destination` - Scratch file the exporter writes
    /// * `events` - Channel the monitor reports progress and the terminal status on
    pub fn start_export<E>(
        &mut self,
        plan: CompositionPlan,
        destination: PathBuf,
        events: &UnboundedSender<E>,
    ) -> Result<JobId>
    where
        E: From<ExportUpdate> + Send + 'static,
    {
        let asset = plan.asset_id.clone();
        if self.registry.for_asset(&asset).is_some() {
            return Err(ExportError::AlreadyExporting { asset: asset.to_string() }.into());
        }

        let session = self.exporter.start(plan, destination.clone())?;
        let id = self.registry.reserve_id();

        spawn_monitor(id, asset.clone(), Arc::clone(&session), self.poll, events.clone());

        info!("Export {} started for {} into {:?}", id, asset, destination);
        self.registry.insert(ExportJob {
            id,
            asset,
            destination,
            session,
        });

        Ok(id)
    }

    /// Resolve a finished export.
    ///
    /// The job leaves the registry whatever the status. A completed export
    /// with an output file goes straight to compression; anything else is
    /// reported without compressing.
    ///
    /// # Arguments
    ///
    /// * `finished` - Terminal snapshot sent by the job's monitor
    /// * `events` - Channel compression updates are sent on
    pub fn finish<E>(&mut self, finished: ExportFinished, events: &UnboundedSender<E>) -> ExportResolution
    where
        E: From<CompressionUpdate> + Send + 'static,
    {
        let Some(job) = self.registry.remove(finished.job) else {
            debug!("Ignoring unknown {}", finished.job);
            return ExportResolution::Unknown;
        };

        match (finished.status, finished.output) {
            (ExportStatus::Completed, Some(output)) => {
                match self.compression.compress(job.asset.clone(), output, events) {
                    Ok(destination) => ExportResolution::Compressing { destination },
                    Err(e) => {
                        warn!("Could not start compression for {}: {}", job.asset, e);
                        remove_destination(&job);
                        ExportResolution::Failed(e)
                    }
                }
            }
            (ExportStatus::Completed, None) => {
                warn!("Export {} for {} completed without an output file", job.id, job.asset);
                remove_destination(&job);
                ExportResolution::Failed(ExportError::MissingOutput.into())
            }
            (ExportStatus::Failed, _) => {
                let reason = finished.error.unwrap_or_else(|| "unknown error".to_string());
                warn!("Export of {} failed: {}", job.asset, reason);
                remove_destination(&job);
                ExportResolution::Failed(ExportError::Failed { reason }.into())
            }
            (ExportStatus::Cancelled, _) => {
                info!("Export of {} cancelled", job.asset);
                remove_destination(&job);
                ExportResolution::Cancelled
            }
            (status, _) => {
                warn!("Export {} ended with {} status, not handled", job.id, status);
                remove_destination(&job);
                ExportResolution::Failed(ExportError::UnexpectedStatus { status: status.to_string() }.into())
            }
        }
    }

    /// Drop a finished export nobody waits for anymore. The output is
    /// deleted instead of compressed.
    pub fn discard(&mut self, finished: ExportFinished) {
        if let Some(job) = self.registry.remove(finished.job) {
            debug!("Discarding {} ({}) ended {}", job.id, job.asset, finished.status);
            remove_destination(&job);
        }
    }

    /// Cancel every registered session, then every running compression.
    ///
    /// Returns the number of sessions asked to cancel.
    pub fn force_cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for job in self.registry.iter() {
            debug!("Cancelling {} ({})", job.id, job.asset);
            job.session.cancel();
            cancelled += 1;
        }
        self.compression.cancel();

        info!("Requested cancellation of {} export(s) and running compressions", cancelled);
        cancelled
    }

    pub fn active_exports(&self) -> usize {
        self.registry.len()
    }

    pub fn is_exporting(&self, asset: &AssetId) -> bool {
        self.registry.for_asset(asset).is_some()
    }

    pub fn compression(&self) -> &CompressionService {
        &self.compression
    }
}

/// Remove a job's own destination file
fn remove_destination(job: &ExportJob) {
    if let Err(e) = remove_if_exists(&job.destination) {
        warn!("Could not remove {:?}: {}", job.destination, e);
    }
}
