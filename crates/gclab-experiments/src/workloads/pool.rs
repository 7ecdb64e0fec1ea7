//! Buffer pool versus direct allocation

use gclab_gc::BufferPool;
use gclab_profiler::{ExperimentResult, measure};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::error::Result;
use crate::report::{ms, us};

const ITERATIONS: usize = 2_000_000;
const BUFFER_SIZE: usize = 128;
/// Every n-th buffer is kept to add pressure
const KEEP_EVERY: usize = 1000;
const PROGRESS_EVERY: usize = 500_000;

/// Both halves of the comparison
#[derive(Debug, Clone)]
pub struct PoolComparison {
    /// Fresh allocation every iteration
    pub direct: ExperimentResult,
    /// Buffers reused through a pool
    pub pooled: ExperimentResult,
}

impl PoolComparison {
    /// Direct time over pooled time
    pub fn speedup(&self) -> f64 {
        ratio(self.direct.elapsed.as_secs_f64(), self.pooled.elapsed.as_secs_f64())
    }

    /// Direct allocations over pooled allocations
    pub fn alloc_reduction(&self) -> f64 {
        self.direct.allocations as f64 / (self.pooled.allocations + 1) as f64
    }

    /// Direct collections over pooled collections, both offset by one
    pub fn gc_reduction(&self) -> f64 {
        (self.direct.collections + 1) as f64 / (self.pooled.collections + 1) as f64
    }
}

fn ratio(a: f64, b: f64) -> f64 {
    if b > 0.0 { a / b } else { 0.0 }
}

/// Run `iterations` buffer uses directly, then through a pool
pub fn compare(ctx: &mut Context<'_>, iterations: usize, buffer_size: usize) -> Result<PoolComparison> {
    let heap = Arc::clone(&ctx.heap);
    let progress_every = ctx.scaled(PROGRESS_EVERY);
    writeln!(ctx.out, "{iterations} uses of a {buffer_size} byte buffer")?;

    writeln!(ctx.out)?;
    writeln!(ctx.out, "1. direct allocation...")?;
    let mut progress = Vec::new();
    let direct = measure(&heap, || {
        let mut sink = Vec::new();
        for i in 0..iterations {
            let data = heap.alloc(buffer_size);
            super::touch(&data, 8, (i % 256) as u8);
            if i % KEEP_EVERY == 0 {
                sink.push(data);
            }
            if i > 0 && i % progress_every == 0 {
                progress.push(i);
            }
        }
        sink
    });
    for i in progress.drain(..) {
        writeln!(ctx.out, "   {i}/{iterations}")?;
    }
    print_result(ctx, &direct.result)?;

    drop(black_box(direct.value));
    heap.collect();
    ctx.hold(Duration::from_millis(100));

    writeln!(ctx.out)?;
    writeln!(ctx.out, "2. buffer pool...")?;
    let pool = BufferPool::new(Arc::clone(&heap), buffer_size);
    let pooled = measure(&heap, || {
        let mut sink = Vec::new();
        for i in 0..iterations {
            let data = pool.get();
            super::touch(&data, 8, (i % 256) as u8);
            if i % KEEP_EVERY == 0 {
                sink.push(heap.alloc_copy(&data));
            }
            pool.put(data);
            if i > 0 && i % progress_every == 0 {
                progress.push(i);
            }
        }
        sink
    });
    for i in progress.drain(..) {
        writeln!(ctx.out, "   {i}/{iterations}")?;
    }
    print_result(ctx, &pooled.result)?;
    drop(black_box(pooled.value));

    ctx.record("direct", &direct.result);
    ctx.record("pooled", &pooled.result);

    Ok(PoolComparison {
        direct: direct.result,
        pooled: pooled.result,
    })
}

fn print_result(ctx: &mut Context<'_>, r: &ExperimentResult) -> Result<()> {
    writeln!(
        ctx.out,
        "result: time {}, GCs {}, allocations {}, pause {}",
        ms(r.elapsed),
        r.collections,
        r.allocations,
        us(r.pause_total)
    )?;
    Ok(())
}

/// Run the pool experiment
pub fn run(ctx: &mut Context<'_>) -> Result<()> {
    let iterations = ctx.scaled(ITERATIONS);
    let comparison = compare(ctx, iterations, BUFFER_SIZE)?;
    writeln!(ctx.out)?;
    writeln!(
        ctx.out,
        "comparison: {:.2}x faster, {:.2}x fewer allocations, {:.2}x fewer GCs",
        comparison.speedup(),
        comparison.alloc_reduction(),
        comparison.gc_reduction()
    )?;
    Ok(())
}
