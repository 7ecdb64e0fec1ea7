//! GC Heap management

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::collector::{CycleLog, GcStats, GcTrigger};
use crate::object::{Block, GcBuf};
use crate::tuning::GcPercent;
use crate::workers::Workers;

/// GC configuration
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Growth allowed over the live heap before a cycle (default: 100)
    pub gc_percent: GcPercent,
    /// Heap size below which no automatic cycle starts (default: 4MB)
    pub min_heap: usize,
    /// Stack size of tracked workers (default: 64KB)
    pub worker_stack_size: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            gc_percent: GcPercent::DEFAULT,
            min_heap: 4 * 1024 * 1024,     // 4MB
            worker_stack_size: 64 * 1024, // 64KB
        }
    }
}

impl GcConfig {
    /// Same configuration with a different growth percentage
    pub fn with_gc_percent(&self, gc_percent: GcPercent) -> Self {
        Self {
            gc_percent,
            ..self.clone()
        }
    }
}

/// Main GC heap - shared between threads
///
/// Blocks are tracked in a single list. Allocation appends under the list
/// lock and a cycle sweeps under the same lock, so a cycle stops every
/// allocating thread for its duration.
pub struct GcHeap {
    config: GcConfig,
    /// Every block not yet swept
    blocks: Mutex<Vec<Arc<Block>>>,
    /// Sum of tracked block sizes
    heap_bytes: CachePadded<AtomicUsize>,
    heap_peak: AtomicUsize,
    /// Heap size that starts the next automatic cycle
    next_gc: AtomicUsize,
    mallocs: CachePadded<AtomicU64>,
    frees: AtomicU64,
    cycles: Mutex<CycleLog>,
    workers: Workers,
}

impl GcHeap {
    /// Create new heap with default config
    pub fn new() -> Arc<Self> {
        Self::with_config(GcConfig::default())
    }

    /// Create new heap with custom config
    pub fn with_config(config: GcConfig) -> Arc<Self> {
        Arc::new(Self {
            next_gc: AtomicUsize::new(config.gc_percent.target(0, config.min_heap)),
            workers: Workers::new(config.worker_stack_size),
            blocks: Mutex::new(Vec::new()),
            heap_bytes: CachePadded::new(AtomicUsize::new(0)),
            heap_peak: AtomicUsize::new(0),
            mallocs: CachePadded::new(AtomicU64::new(0)),
            frees: AtomicU64::new(0),
            cycles: Mutex::new(CycleLog::new()),
            config,
        })
    }

    /// Allocate a zeroed buffer of `size` bytes.
    ///
    /// Runs a collection cycle first if the allocation would take the heap
    /// past the pacing target.
    pub fn alloc(&self, size: usize) -> GcBuf {
        self.track(Block::zeroed(size))
    }

    /// Allocate a fresh block holding a copy of `src`'s view
    pub fn alloc_copy(&self, src: &GcBuf) -> GcBuf {
        self.track(Block::from_vec(src.to_vec()))
    }

    fn track(&self, block: Block) -> GcBuf {
        let size = block.size();
        if self.should_gc(size) {
            self.run_cycle(GcTrigger::Heap, size);
        }

        let block = Arc::new(block);
        {
            let mut blocks = self.blocks.lock();
            blocks.push(Arc::clone(&block));
            // Counted under the list lock so a sweep never sees an untracked size
            let now = self.heap_bytes.fetch_add(size, Ordering::AcqRel) + size;
            self.heap_peak.fetch_max(now, Ordering::Relaxed);
        }
        self.mallocs.fetch_add(1, Ordering::Relaxed);
        GcBuf::new(block)
    }

    /// Check if an allocation of `incoming` bytes should start a cycle
    pub fn should_gc(&self, incoming: usize) -> bool {
        self.heap_bytes().saturating_add(incoming) > self.next_gc.load(Ordering::Acquire)
    }

    /// Force a full collection cycle, returning the bytes reclaimed
    pub fn collect(&self) -> usize {
        self.run_cycle(GcTrigger::Forced, 0)
    }

    fn run_cycle(&self, trigger: GcTrigger, incoming: usize) -> usize {
        let start = Instant::now();
        let mut blocks = self.blocks.lock();

        // Another thread may have finished a cycle while we waited for the lock
        if trigger == GcTrigger::Heap && !self.should_gc(incoming) {
            return 0;
        }

        let before_bytes = self.heap_bytes();
        let before_objects = blocks.len();
        tracing::debug!(
            target: "gclab::gc",
            ?trigger,
            heap_bytes = before_bytes,
            objects = before_objects,
            "GC cycle starting"
        );

        // A block only the heap refers to is unreachable
        let mut reclaimed = 0usize;
        blocks.retain(|block| {
            if Arc::strong_count(block) > 1 {
                true
            } else {
                reclaimed += block.size();
                false
            }
        });
        let freed = before_objects - blocks.len();

        let live = self.heap_bytes.fetch_sub(reclaimed, Ordering::AcqRel) - reclaimed;
        self.frees.fetch_add(freed as u64, Ordering::Relaxed);
        self.next_gc.store(
            self.config.gc_percent.target(live, self.config.min_heap),
            Ordering::Release,
        );
        drop(blocks);

        let pause = start.elapsed();
        let mut cycles = self.cycles.lock();
        cycles.record(trigger, pause, reclaimed);

        tracing::debug!(
            target: "gclab::gc",
            collection = cycles.collections(),
            reclaimed_bytes = reclaimed,
            freed_objects = freed,
            pause_us = pause.as_micros() as u64,
            live_bytes = live,
            "GC cycle complete"
        );

        reclaimed
    }

    /// Get current heap bytes, including garbage not yet swept
    pub fn heap_bytes(&self) -> usize {
        self.heap_bytes.load(Ordering::Acquire)
    }

    /// Get number of completed collection cycles
    pub fn num_gc(&self) -> u64 {
        self.cycles.lock().collections()
    }

    /// Recent pauses, oldest first
    pub fn pause_history(&self) -> Vec<Duration> {
        self.cycles.lock().history()
    }

    /// Get a consistent-enough view of every counter
    pub fn stats(&self) -> GcStats {
        let mut stats = GcStats {
            heap_bytes: self.heap_bytes(),
            heap_peak: self.heap_peak.load(Ordering::Relaxed),
            heap_objects: self.blocks.lock().len(),
            mallocs: self.mallocs.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            next_gc: self.next_gc.load(Ordering::Acquire),
            gc_percent: self.config.gc_percent,
            live_workers: self.workers.live(),
            ..GcStats::default()
        };
        self.cycles.lock().fill(&mut stats);
        stats
    }

    /// Tracked worker registry
    pub fn workers(&self) -> &Workers {
        &self.workers
    }

    /// Get config
    pub fn config(&self) -> &GcConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_creation() {
        let heap = GcHeap::new();
        assert_eq!(heap.heap_bytes(), 0);
        assert_eq!(heap.num_gc(), 0);
        assert_eq!(heap.stats().next_gc, 4 * 1024 * 1024);
    }

    #[test]
    fn test_alloc_counts() {
        let heap = GcHeap::new();
        let a = heap.alloc(100);
        let b = heap.alloc(200);

        let stats = heap.stats();
        assert_eq!(stats.heap_bytes, 300);
        assert_eq!(stats.heap_objects, 2);
        assert_eq!(stats.mallocs, 2);
        assert_eq!(stats.heap_peak, 300);
        assert_eq!(a.len() + b.len(), 300);
    }

    #[test]
    fn test_garbage_stays_until_collect() {
        let heap = GcHeap::new();
        drop(heap.alloc(4096));
        assert_eq!(heap.heap_bytes(), 4096);

        assert_eq!(heap.collect(), 4096);
        assert_eq!(heap.heap_bytes(), 0);
        assert_eq!(heap.stats().frees, 1);
    }

    #[test]
    fn test_alloc_copy_is_independent() {
        let heap = GcHeap::new();
        let large = heap.alloc(1024);
        large.with_bytes_mut(|b| b[..4].copy_from_slice(&[1, 2, 3, 4]));

        let copy = heap.alloc_copy(&large.slice(0..4));
        assert_eq!(copy.block_size(), 4);
        assert_eq!(copy.to_vec(), vec![1, 2, 3, 4]);

        drop(large);
        assert_eq!(heap.collect(), 1024);
        assert_eq!(heap.heap_bytes(), 4);
    }
}
