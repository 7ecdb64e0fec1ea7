//! Collection cycle bookkeeping

use std::time::Duration;

use crate::tuning::GcPercent;

/// Number of recent pauses kept for inspection
pub const PAUSE_HISTORY: usize = 256;

/// Why a collection cycle ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcTrigger {
    /// Heap reached the pacing target
    Heap,
    /// Explicit `collect()` call
    Forced,
}

/// GC statistics
#[derive(Debug, Default, Clone)]
pub struct GcStats {
    /// Bytes held by tracked blocks, including unswept garbage
    pub heap_bytes: usize,
    /// Highest `heap_bytes` ever observed
    pub heap_peak: usize,
    /// Tracked blocks
    pub heap_objects: usize,
    /// Allocations performed
    pub mallocs: u64,
    /// Blocks reclaimed
    pub frees: u64,
    /// Completed collection cycles
    pub collections: u64,
    /// Cycles started by `collect()`
    pub forced_collections: u64,
    /// Cumulative pause time
    pub pause_total: Duration,
    /// Pause of the most recent cycle
    pub last_pause: Duration,
    /// Longest pause among the recent history
    pub max_recent_pause: Duration,
    /// Bytes reclaimed by the most recent cycle
    pub last_reclaimed: usize,
    /// Heap size that starts the next automatic cycle
    pub next_gc: usize,
    /// Growth knob in effect
    pub gc_percent: GcPercent,
    /// Tracked workers that have not finished
    pub live_workers: usize,
}

/// Ring of recent pauses plus running totals.
pub(crate) struct CycleLog {
    collections: u64,
    forced: u64,
    pause_total: Duration,
    last_reclaimed: usize,
    ring: [Duration; PAUSE_HISTORY],
}

impl CycleLog {
    pub(crate) fn new() -> Self {
        Self {
            collections: 0,
            forced: 0,
            pause_total: Duration::ZERO,
            last_reclaimed: 0,
            ring: [Duration::ZERO; PAUSE_HISTORY],
        }
    }

    pub(crate) fn record(&mut self, trigger: GcTrigger, pause: Duration, reclaimed: usize) {
        self.ring[(self.collections % PAUSE_HISTORY as u64) as usize] = pause;
        self.collections += 1;
        if trigger == GcTrigger::Forced {
            self.forced += 1;
        }
        self.pause_total += pause;
        self.last_reclaimed = reclaimed;
    }

    pub(crate) fn collections(&self) -> u64 {
        self.collections
    }

    /// Recent pauses, oldest first
    pub(crate) fn history(&self) -> Vec<Duration> {
        let n = self.collections.min(PAUSE_HISTORY as u64) as usize;
        let next = (self.collections % PAUSE_HISTORY as u64) as usize;
        (0..n)
            .map(|i| self.ring[(next + PAUSE_HISTORY - n + i) % PAUSE_HISTORY])
            .collect()
    }

    pub(crate) fn fill(&self, stats: &mut GcStats) {
        stats.collections = self.collections;
        stats.forced_collections = self.forced;
        stats.pause_total = self.pause_total;
        stats.last_reclaimed = self.last_reclaimed;
        if self.collections > 0 {
            let last = ((self.collections - 1) % PAUSE_HISTORY as u64) as usize;
            stats.last_pause = self.ring[last];
        }
        stats.max_recent_pause = self.ring.iter().copied().max().unwrap_or_default();
    }
}
