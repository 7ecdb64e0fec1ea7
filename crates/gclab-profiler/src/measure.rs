//! Before/after measurement of a workload

use gclab_gc::GcHeap;

use crate::snapshot::{ExperimentResult, StatsSnapshot};

/// A workload's return value together with what it cost
#[derive(Debug)]
pub struct Measured<T> {
    /// Whatever the workload returned
    pub value: T,
    /// Snapshot taken before the workload
    pub before: StatsSnapshot,
    /// Snapshot taken after the workload
    pub after: StatsSnapshot,
    /// Delta between the snapshots
    pub result: ExperimentResult,
}

/// Snapshot, run `work` to completion, snapshot again.
///
/// `work` must join every worker it starts before returning. Any other
/// activity on the same heap in the meantime shows up in the delta too.
pub fn measure<T>(heap: &GcHeap, work: impl FnOnce() -> T) -> Measured<T> {
    let before = StatsSnapshot::capture(heap);
    let value = work();
    let after = StatsSnapshot::capture(heap);
    let result = after.delta_since(&before);
    Measured {
        value,
        before,
        after,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_returns_value_and_delta() {
        let heap = GcHeap::new();
        let measured = measure(&heap, || {
            (0..10).map(|_| heap.alloc(64)).collect::<Vec<_>>()
        });

        assert_eq!(measured.value.len(), 10);
        assert_eq!(measured.result.allocations, 10);
        assert_eq!(measured.result.heap_after, 640);
        assert!(measured.after.taken_at >= measured.before.taken_at);
    }

    #[test]
    fn test_measure_sees_worker_allocations() {
        let heap = GcHeap::new();
        let measured = measure(&heap, || {
            std::thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| {
                        for _ in 0..25 {
                            drop(heap.alloc(32));
                        }
                    });
                }
            });
        });

        assert_eq!(measured.result.allocations, 100);
    }
}
