//! # Pipeline
//!
//! Runs each request through download, composition, export and
//! compression. Every request is a small state machine owned by the
//! [`Coordinator`] task; callers talk to it through a [`PipelineHandle`].

pub mod coordinator;
pub mod handle;
pub mod outcome;
pub mod state;

pub use coordinator::Coordinator;
pub use handle::PipelineHandle;
pub use outcome::{PipelineOutcome, SilentOutcomes};
pub use state::{AssetStage, StageEvent};
