//! Outcome checks for workloads that expose their measurements

use gclab_experiments::Context;
use gclab_experiments::ExperimentConfig;
use gclab_experiments::workloads::{concurrent, leak, pool};
use gclab_gc::{GcConfig, GcHeap};
use std::time::Duration;

fn config(scale: f64) -> ExperimentConfig {
    ExperimentConfig {
        scale,
        settle: Duration::ZERO,
        pause_between: Duration::ZERO,
        gc: GcConfig {
            min_heap: 256 * 1024,
            ..GcConfig::default()
        },
        ..ExperimentConfig::default()
    }
}

#[test]
fn test_pool_allocates_less_than_direct() {
    let config = config(0.01);
    let mut out = Vec::new();
    let mut ctx = Context::with_fresh_heap(&config, &mut out);

    let comparison = pool::compare(&mut ctx, 20_000, 128).unwrap();

    assert_eq!(comparison.direct.allocations, 20_000);
    assert!(comparison.pooled.allocations < comparison.direct.allocations);
    assert!(comparison.alloc_reduction() > 1.0);
}

#[test]
fn test_slice_fix_releases_large_buffer() {
    let config = config(1.0);
    let mut out = Vec::new();
    let mut ctx = Context::with_fresh_heap(&config, &mut out);

    let size = 2 * 1024 * 1024;
    let outcome = leak::slice_retention(&mut ctx, size).unwrap();

    assert_eq!(outcome.view_len, 100);
    assert_eq!(outcome.view_capacity, size);
    assert!(outcome.retained_heap >= size as u64);
    assert!(outcome.before_release - outcome.after_release >= outcome.released as u64);
}

#[test]
fn test_concurrent_load_accounts_every_allocation() {
    let heap = GcHeap::with_config(GcConfig {
        min_heap: 128 * 1024,
        ..GcConfig::default()
    });
    let load = concurrent::ConcurrentLoad {
        workers: 6,
        work_per_worker: 3000,
        block_size: 512,
    };

    let shared = concurrent::run_load(&heap, load).unwrap();

    // keys at 0, 1000, 2000 all fall in the removed range
    assert!(shared.is_empty());
    let stats = heap.stats();
    assert_eq!(stats.mallocs, 6 * 3000);
    assert!(stats.collections > 0);
}
