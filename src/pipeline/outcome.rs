use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Final result of one fetch-and-crop request
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Compressed file, owned by the caller from now on
    Completed(PathBuf),
    Failed(PipelineError),
    Cancelled,
    /// The media store could not provide the asset
    Unavailable,
}

impl PipelineOutcome {
    /// Outcomes that callers may opt out of hearing about
    pub fn is_silent(&self) -> bool {
        matches!(self, PipelineOutcome::Cancelled | PipelineOutcome::Unavailable)
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            PipelineOutcome::Completed(path) => Some(path),
            _ => None,
        }
    }
}

/// What to do with cancelled and unavailable outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilentOutcomes {
    /// Deliver them like any other outcome
    #[default]
    Notify,
    /// Drop the reply channel without sending anything
    Suppress,
}
