//! The same workload under different growth percentages

use gclab_gc::{GcHeap, GcPercent};
use gclab_profiler::{format_bytes, measure};
use std::hint::black_box;

use crate::context::Context;
use crate::error::Result;
use crate::report::{Table, ms, us};

const PERCENTS: [u32; 5] = [50, 100, 200, 400, 800];

const WORK_ALLOCS: usize = 200_000;
const WORK_BLOCK: usize = 2048;
const WINDOW: usize = 5000;
const TRIM: usize = 1000;

/// Allocate continuously while keeping a sliding window of recent blocks
pub(crate) fn memory_work(heap: &GcHeap, allocs: usize) {
    let window = WINDOW.min(allocs);
    let trim = TRIM.min(window.max(1));
    let mut data = Vec::with_capacity(window + 20);
    for i in 0..allocs {
        data.push(heap.alloc(WORK_BLOCK));
        if i % 20 == 0 && data.len() > window {
            data.drain(..trim);
        }
    }
    drop(black_box(data));
}

/// Run the percent comparison
pub fn run(ctx: &mut Context<'_>) -> Result<()> {
    let allocs = ctx.scaled(WORK_ALLOCS);
    writeln!(ctx.out, "testing growth percentages {:?}...", PERCENTS)?;

    let mut rows = Vec::with_capacity(PERCENTS.len());
    for (i, percent) in PERCENTS.into_iter().enumerate() {
        writeln!(ctx.out, "GC percent = {percent}")?;
        let heap = ctx.heap_with(GcPercent::Percent(percent));
        let measured = measure(&heap, || memory_work(&heap, allocs));
        let r = measured.result;

        writeln!(
            ctx.out,
            "  time: {}, GCs: {}, pause: {}, peak heap: {}",
            ms(r.elapsed),
            r.collections,
            us(r.pause_total),
            format_bytes(r.heap_peak)
        )?;
        ctx.record(format!("percent={percent}"), &r);
        rows.push((percent, r));

        if i + 1 < PERCENTS.len() {
            ctx.settle();
        }
    }

    writeln!(ctx.out)?;
    writeln!(ctx.out, "comparison:")?;
    let table = Table::new(&[8, 10, 6, 10, 10, 10]);
    table.row(ctx.out, ["percent", "time", "GCs", "pause", "peak", "allocs"])?;
    for (percent, r) in &rows {
        table.row(
            ctx.out,
            [
                percent.to_string(),
                ms(r.elapsed),
                r.collections.to_string(),
                us(r.pause_total),
                format_bytes(r.heap_peak),
                r.allocations.to_string(),
            ],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gclab_gc::GcConfig;

    #[test]
    fn test_memory_work_keeps_window_bounded() {
        let heap = GcHeap::with_config(GcConfig {
            min_heap: 256 * 1024,
            ..GcConfig::default()
        });
        memory_work(&heap, 20_000);

        let stats = heap.stats();
        assert_eq!(stats.mallocs, 20_000);
        assert!(stats.collections > 0);
        // the window is at most WINDOW + 20 blocks, the heap at most twice that
        assert!(stats.heap_peak <= 2 * (WINDOW + 20) * WORK_BLOCK + WORK_BLOCK);
    }
}
