//! # gclab profiler
//!
//! Snapshots of heap statistics, before/after measurement of a workload,
//! periodic sampling and the formatting helpers used by every report.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod format;
pub mod measure;
pub mod sampler;
pub mod snapshot;

pub use format::{format_bytes, format_duration, round_duration};
pub use measure::{Measured, measure};
pub use sampler::{Sampler, SamplerHandle};
pub use snapshot::{ExperimentResult, StatsSnapshot};
