//! # Composition
//!
//! Turns a loaded asset and a crop request into a [`CompositionPlan`]: the
//! trimmed time range, the orientation-corrected transform and the render
//! size an exporter needs.

pub mod builder;
pub mod types;

// Re-exports for convenience
pub use builder::{correct_transform, effective_duration, CompositionBuilder};
pub use types::{CompositionPlan, CompositionTrack, CropSpecification, LayerInstruction};
