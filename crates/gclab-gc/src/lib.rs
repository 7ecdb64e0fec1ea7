//! # gclab garbage-collected heap
//!
//! A small collected heap of byte buffers that exposes the statistics and
//! knobs a managed runtime would: heap bytes, collection counts, pause
//! times, a growth percentage and a manual collection trigger.
//!
//! ## Design
//!
//! - **Handles**: every allocation is a [`GcBuf`]; any handle or view keeps
//!   the whole underlying block reachable
//! - **Deferred reclamation**: dropped blocks stay counted in the heap until
//!   a collection cycle sweeps them
//! - **Pacing**: a cycle starts when the heap would exceed
//!   `live + live * percent / 100` (never below the minimum heap)
//! - **Workers**: tracked threads so experiments can observe leaked workers

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod collector;
pub mod error;
pub mod heap;
pub mod object;
pub mod pool;
pub mod tuning;
pub mod workers;

pub use collector::GcStats;
pub use error::{GcError, Result};
pub use heap::{GcConfig, GcHeap};
pub use object::GcBuf;
pub use pool::BufferPool;
pub use tuning::GcPercent;
pub use workers::Workers;
