//! Bulk allocation, forced collection, release

use gclab_profiler::{StatsSnapshot, format_bytes};
use std::hint::black_box;

use crate::context::Context;
use crate::error::Result;
use crate::report::{Table, ms};

const TOTAL_ALLOCS: usize = 100_000;
const BLOCK_SIZE: usize = 4096;
const PROGRESS_EVERY: usize = 10_000;

/// Run the basic experiment
pub fn run(ctx: &mut Context<'_>) -> Result<()> {
    let heap = &ctx.heap;
    let total = ctx.scaled(TOTAL_ALLOCS);
    let progress_every = ctx.scaled(PROGRESS_EVERY);

    let initial = StatsSnapshot::capture(heap);
    writeln!(
        ctx.out,
        "initial - heap: {}, GC: {}",
        format_bytes(initial.heap_bytes),
        initial.collections
    )?;

    writeln!(ctx.out, "allocating {total} blocks of {BLOCK_SIZE} bytes...")?;
    let mut data = Vec::with_capacity(total);
    for i in 0..total {
        data.push(heap.alloc(BLOCK_SIZE));

        if i > 0 && i % progress_every == 0 {
            let s = StatsSnapshot::capture(heap);
            writeln!(
                ctx.out,
                "after {} - heap: {}, GC: {}, pause: {}",
                i,
                format_bytes(s.heap_bytes),
                s.collections,
                ms(s.pause_total)
            )?;
        }
    }

    writeln!(ctx.out, "forcing a collection...")?;
    heap.collect();
    let allocated = StatsSnapshot::capture(heap);
    writeln!(
        ctx.out,
        "after GC - heap: {}, GC: {}, total pause: {}",
        format_bytes(allocated.heap_bytes),
        allocated.collections,
        ms(allocated.pause_total)
    )?;

    writeln!(ctx.out, "releasing references...")?;
    drop(black_box(data));
    heap.collect();
    let released = StatsSnapshot::capture(heap);
    writeln!(
        ctx.out,
        "after release - heap: {}, GC: {}",
        format_bytes(released.heap_bytes),
        released.collections
    )?;

    ctx.record("allocate", &allocated.delta_since(&initial));
    ctx.record("release", &released.delta_since(&allocated));

    writeln!(ctx.out)?;
    writeln!(ctx.out, "summary:")?;
    let table = Table::new(&[14, 12, 8, 12]);
    table.row(ctx.out, ["phase", "heap", "GCs", "pause"])?;
    for (phase, s) in [
        ("initial", &initial),
        ("allocated", &allocated),
        ("released", &released),
    ] {
        table.row(
            ctx.out,
            [
                phase.to_string(),
                format_bytes(s.heap_bytes),
                s.collections.to_string(),
                ms(s.pause_total),
            ],
        )?;
    }
    Ok(())
}
