//! Point-in-time heap statistics and the deltas between them

use gclab_gc::GcHeap;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Heap statistics captured at one instant.
///
/// Snapshots are never updated; compare two of them with
/// [`StatsSnapshot::delta_since`].
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// When the snapshot was taken
    pub taken_at: Instant,
    /// Heap bytes, including unswept garbage
    pub heap_bytes: u64,
    /// Peak heap bytes so far
    pub heap_peak: u64,
    /// Tracked blocks
    pub heap_objects: u64,
    /// Completed collection cycles
    pub collections: u64,
    /// Cumulative pause time
    pub pause_total: Duration,
    /// Longest recent pause
    pub max_recent_pause: Duration,
    /// Cumulative allocations
    pub mallocs: u64,
    /// Cumulative reclaimed blocks
    pub frees: u64,
    /// Tracked workers still running
    pub live_workers: u64,
}

impl StatsSnapshot {
    /// Read the heap's current statistics
    pub fn capture(heap: &GcHeap) -> Self {
        let stats = heap.stats();
        Self {
            taken_at: Instant::now(),
            heap_bytes: stats.heap_bytes as u64,
            heap_peak: stats.heap_peak as u64,
            heap_objects: stats.heap_objects as u64,
            collections: stats.collections,
            pause_total: stats.pause_total,
            max_recent_pause: stats.max_recent_pause,
            mallocs: stats.mallocs,
            frees: stats.frees,
            live_workers: stats.live_workers as u64,
        }
    }

    /// Changes from `before` to this snapshot
    pub fn delta_since(&self, before: &StatsSnapshot) -> ExperimentResult {
        ExperimentResult {
            elapsed: self.taken_at.saturating_duration_since(before.taken_at),
            collections: self.collections.saturating_sub(before.collections),
            pause_total: self.pause_total.saturating_sub(before.pause_total),
            allocations: self.mallocs.saturating_sub(before.mallocs),
            frees: self.frees.saturating_sub(before.frees),
            heap_before: before.heap_bytes,
            heap_after: self.heap_bytes,
            heap_peak: self.heap_peak,
            max_recent_pause: self.max_recent_pause,
        }
    }
}

/// What changed while a workload ran
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExperimentResult {
    /// Wall-clock time between the snapshots
    #[serde(serialize_with = "as_micros")]
    pub elapsed: Duration,
    /// Collection cycles completed
    pub collections: u64,
    /// Pause time accumulated
    #[serde(serialize_with = "as_micros")]
    pub pause_total: Duration,
    /// Allocations performed
    pub allocations: u64,
    /// Blocks reclaimed
    pub frees: u64,
    /// Heap bytes before
    pub heap_before: u64,
    /// Heap bytes after
    pub heap_after: u64,
    /// Peak heap bytes at the end
    pub heap_peak: u64,
    /// Longest recent pause at the end
    #[serde(serialize_with = "as_micros")]
    pub max_recent_pause: Duration,
}

impl ExperimentResult {
    /// Mean pause per cycle, if any cycle ran
    pub fn avg_pause(&self) -> Option<Duration> {
        if self.collections == 0 {
            return None;
        }
        let nanos = self.pause_total.as_nanos() / u128::from(self.collections);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    /// Pause time as a percentage of elapsed time
    pub fn gc_overhead_percent(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 {
            self.pause_total.as_secs_f64() / elapsed * 100.0
        } else {
            0.0
        }
    }

    /// Operations per second over the elapsed time
    pub fn throughput(&self, ops: u64) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 { ops as f64 / elapsed } else { 0.0 }
    }

    /// Export as a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_micros() as u64)
}
