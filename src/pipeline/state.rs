use std::fmt;
use std::path::PathBuf;

use crate::export::JobId;

/// Where one asset's pipeline currently is.
///
/// Stages only move forward; `next` refuses anything else, so an asset
/// cannot be compressing before its export finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetStage {
    Idle,
    Downloading,
    Composing,
    Exporting { job: JobId },
    Compressing { output: PathBuf },
    Done,
    Failed,
    Cancelled,
    Unavailable,
}

/// Inputs that move an asset between stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    FetchRequested,
    Fetched,
    Missing,
    ExportStarted { job: JobId },
    Exported { output: PathBuf },
    Compressed,
    Failed,
    Cancel,
}

impl AssetStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssetStage::Done | AssetStage::Failed | AssetStage::Cancelled | AssetStage::Unavailable
        )
    }

    /// Stage after `event`, or `None` if the event is not valid here
    pub fn next(&self, event: StageEvent) -> Option<AssetStage> {
        use AssetStage as S;
        use StageEvent as E;

        if self.is_terminal() {
            return None;
        }

        let next = match (self, event) {
            (S::Idle, E::FetchRequested) => S::Downloading,
            (S::Downloading, E::Fetched) => S::Composing,
            (S::Downloading, E::Missing) => S::Unavailable,
            (S::Composing, E::ExportStarted { job }) => S::Exporting { job },
            (S::Exporting { .. }, E::Exported { output }) => S::Compressing { output },
            (S::Compressing { .. }, E::Compressed) => S::Done,
            (_, E::Failed) => S::Failed,
            (_, E::Cancel) => S::Cancelled,
            _ => return None,
        };
        Some(next)
    }
}

impl fmt::Display for AssetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetStage::Idle => write!(f, "idle"),
            AssetStage::Downloading => write!(f, "downloading"),
            AssetStage::Composing => write!(f, "composing"),
            AssetStage::Exporting { job } => write!(f, "exporting ({})", job),
            AssetStage::Compressing { .. } => write!(f, "compressing"),
            AssetStage::Done => write!(f, "done"),
            AssetStage::Failed => write!(f, "failed"),
            AssetStage::Cancelled => write!(f, "cancelled"),
            AssetStage::Unavailable => write!(f, "unavailable"),
        }
    }
}
