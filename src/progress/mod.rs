//! # Progress
//!
//! Download, export and compression each report their own fraction per
//! asset. [`ProgressAggregator`] folds them into the single value handed to a
//! [`ProgressSink`].

pub mod aggregator;
pub mod sink;

pub use aggregator::{ProgressAggregator, Stage};
pub use sink::{ProgressSink, TracingProgressSink};
