//! Parallel allocation with a shared concurrent map

use crossbeam_utils::sync::WaitGroup;
use dashmap::DashMap;
use gclab_gc::{GcBuf, GcHeap};
use gclab_profiler::{format_bytes, measure};
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;
use crate::report::{ms, us};

const WORKERS: usize = 50;
const WORK_PER_WORKER: usize = 100_000;
const BLOCK_SIZE: usize = 2048;

/// Sizes after scaling
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentLoad {
    /// Parallel workers
    pub workers: usize,
    /// Allocations per worker
    pub work_per_worker: usize,
    /// Bytes per allocation
    pub block_size: usize,
}

fn worker_body(heap: &GcHeap, shared: &DashMap<String, GcBuf>, id: usize, load: ConcurrentLoad) {
    let mut local: Vec<GcBuf> = Vec::new();

    for j in 0..load.work_per_worker {
        let data = heap.alloc(load.block_size);
        super::touch(&data, 64, ((id + j) % 256) as u8);

        if j % 1000 == 0 {
            shared.insert(format!("g{id}-i{j}"), data.clone());
        }
        if j % 100 == 0 {
            local.push(data);
        }
        if local.len() > 50 {
            local.drain(..10);
        }
    }

    for k in 0..10 {
        shared.remove(&format!("g{id}-i{}", k * 1000));
    }
}

/// Spawn the workers, wait for all of them, return the shared map
pub fn run_load(heap: &Arc<GcHeap>, load: ConcurrentLoad) -> Result<Arc<DashMap<String, GcBuf>>> {
    let shared = Arc::new(DashMap::new());
    let wg = WaitGroup::new();

    let mut spawned = Ok(());
    for id in 0..load.workers {
        let wg = wg.clone();
        let heap_ref = Arc::clone(heap);
        let shared = Arc::clone(&shared);
        let started = heap.workers().spawn(format!("alloc-{id}"), move || {
            let _wg = wg;
            worker_body(&heap_ref, &shared, id, load);
        });
        if let Err(e) = started {
            spawned = Err(e);
            break;
        }
    }

    // workers already running finish before any error is reported
    wg.wait();
    spawned?;
    Ok(shared)
}

/// Run the concurrent experiment
pub fn run(ctx: &mut Context<'_>) -> Result<()> {
    let load = ConcurrentLoad {
        workers: ctx.scaled(WORKERS),
        work_per_worker: ctx.scaled(WORK_PER_WORKER),
        block_size: BLOCK_SIZE,
    };
    let total_ops = (load.workers * load.work_per_worker) as u64;

    writeln!(
        ctx.out,
        "{} workers, {} allocations each, {} bytes per allocation",
        load.workers, load.work_per_worker, load.block_size
    )?;
    writeln!(
        ctx.out,
        "total: {} allocations, about {}",
        total_ops,
        format_bytes(total_ops * load.block_size as u64)
    )?;

    let heap = Arc::clone(&ctx.heap);
    let measured = measure(&heap, || run_load(&heap, load));
    let shared = measured.value?;
    let r = measured.result;

    writeln!(ctx.out, "time: {}", ms(r.elapsed))?;
    writeln!(ctx.out, "GCs: {}", r.collections)?;
    writeln!(ctx.out, "total pause: {}", us(r.pause_total))?;
    if let Some(avg) = r.avg_pause() {
        writeln!(ctx.out, "average pause: {}", us(avg))?;
        writeln!(ctx.out, "max recent pause: {}", us(r.max_recent_pause))?;
    }
    writeln!(ctx.out, "peak heap: {}", format_bytes(r.heap_peak))?;
    writeln!(ctx.out, "current heap: {}", format_bytes(r.heap_after))?;
    writeln!(ctx.out, "shared map entries: {}", shared.len())?;
    writeln!(ctx.out, "throughput: {:.0} ops/sec", r.throughput(total_ops))?;
    if r.collections > 0 {
        writeln!(ctx.out, "GC overhead: {:.2}%", r.gc_overhead_percent())?;
    }

    ctx.record("concurrent", &r);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_map_keeps_late_entries() {
        let heap = GcHeap::new();
        let load = ConcurrentLoad {
            workers: 4,
            work_per_worker: 12_000,
            block_size: 64,
        };
        let shared = run_load(&heap, load).unwrap();

        // 12 entries per worker, the first 10 removed at the end
        assert_eq!(shared.len(), 4 * 2);
        assert_eq!(heap.stats().mallocs, 4 * 12_000);
    }

    #[test]
    fn test_spawn_failure_leaves_no_workers() {
        use gclab_gc::GcConfig;

        // no address space can hold this stack
        let heap = GcHeap::with_config(GcConfig {
            worker_stack_size: 1 << 50,
            ..GcConfig::default()
        });
        let load = ConcurrentLoad {
            workers: 4,
            work_per_worker: 100,
            block_size: 64,
        };

        assert!(run_load(&heap, load).is_err());
        assert_eq!(heap.workers().live(), 0);
        assert_eq!(heap.workers().spawned(), 0);
    }
}
