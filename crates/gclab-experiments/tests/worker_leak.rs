//! Blocked workers are counted and never come back.
//!
//! Runs as its own test binary because the leaked threads live until the
//! process exits.

use gclab_experiments::workloads::leak;
use gclab_experiments::{Context, ExperimentConfig};
use std::time::Duration;

#[test]
fn test_leaked_workers_stay_live() {
    let config = ExperimentConfig {
        allow_leaks: true,
        scale: 0.1,
        ..ExperimentConfig::default()
    };
    let mut out = Vec::new();
    let mut ctx = Context::with_fresh_heap(&config, &mut out);

    let outcome = leak::leak_workers(&mut ctx, 100).unwrap();

    assert_eq!(outcome.before, 0);
    assert_eq!(outcome.leaked(), 100);
    assert_eq!(ctx.heap.workers().spawned(), 100);

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(ctx.heap.workers().live(), 100);

    drop(ctx);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("leaked workers: 100"));
}
