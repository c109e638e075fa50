use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::export::session::{ExportSession, ExportStatus};
use crate::media::AssetId;

/// Stable identifier of an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "export#{}", self.0)
    }
}

/// An in-flight export
pub struct ExportJob {
    pub id: JobId,
    pub asset: AssetId,
    pub destination: PathBuf,
    pub session: Arc<dyn ExportSession>,
}

impl ExportJob {
    pub fn status(&self) -> ExportStatus {
        self.session.status()
    }
}

impl fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportJob")
            .field("id", &self.id)
            .field("asset", &self.asset)
            .field("destination", &self.destination)
            .field("status", &self.status())
            .finish()
    }
}

/// Active export sessions keyed by job id.
///
/// Owned by the coordinator; never shared with background tasks.
#[derive(Debug, Default)]
pub struct ExportRegistry {
    next_id: u64,
    jobs: HashMap<JobId, ExportJob>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the id the next inserted job will get
    pub fn reserve_id(&mut self) -> JobId {
        self.next_id += 1;
        JobId(self.next_id)
    }

    pub fn insert(&mut self, job: ExportJob) {
        self.jobs.insert(job.id, job);
    }

    pub fn remove(&mut self, id: JobId) -> Option<ExportJob> {
        self.jobs.remove(&id)
    }

    pub fn get(&self, id: JobId) -> Option<&ExportJob> {
        self.jobs.get(&id)
    }

    pub fn for_asset(&self, asset: &AssetId) -> Option<&ExportJob> {
        self.jobs.values().find(|job| &job.asset == asset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportJob> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
