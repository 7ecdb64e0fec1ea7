//! # gclab experiments
//!
//! Allocation workloads that stress a [`gclab_gc::GcHeap`] in different
//! ways, and the table that maps experiment names to them.
//!
//! Every workload receives an explicit [`Context`]: the heap, the run
//! configuration and the output sink. Nothing here reads process-wide
//! state, so experiments can run side by side in tests.

#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod registry;
pub mod report;
pub mod workloads;

pub use context::{Context, ExperimentConfig, Record};
pub use error::{ExperimentError, Result};
pub use registry::{EXPERIMENTS, Experiment, dispatch, find, usage};
