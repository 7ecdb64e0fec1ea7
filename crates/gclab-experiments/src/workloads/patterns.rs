//! Small, large and long-lived allocation patterns

use gclab_gc::{GcBuf, GcHeap};
use gclab_profiler::{ExperimentResult, measure};
use std::hint::black_box;
use std::time::Duration;

use crate::context::Context;
use crate::error::Result;
use crate::report::{Table, ms, us};

struct Pattern {
    name: &'static str,
    description: &'static str,
    work: fn(&GcHeap, &Sizes) -> Vec<GcBuf>,
}

/// Iteration counts after scaling
struct Sizes {
    small: usize,
    large: usize,
    long_lived: usize,
    hold: Duration,
}

const PATTERNS: &[Pattern] = &[
    Pattern {
        name: "small",
        description: "many small objects",
        work: small_objects,
    },
    Pattern {
        name: "large",
        description: "few large objects",
        work: large_objects,
    },
    Pattern {
        name: "long-lived",
        description: "objects that outlive the loop",
        work: long_lived,
    },
];

fn small_objects(heap: &GcHeap, sizes: &Sizes) -> Vec<GcBuf> {
    let mut kept = Vec::new();
    for i in 0..sizes.small {
        let data = heap.alloc(64);
        data.with_bytes_mut(|b| b[0] = (i % 256) as u8);
        if i % 10_000 == 0 {
            kept.push(data);
        }
    }
    kept
}

fn large_objects(heap: &GcHeap, sizes: &Sizes) -> Vec<GcBuf> {
    (0..sizes.large)
        .map(|i| {
            let data = heap.alloc(64 * 1024);
            super::touch(&data, 1024, (i % 256) as u8);
            data
        })
        .collect()
}

fn long_lived(heap: &GcHeap, sizes: &Sizes) -> Vec<GcBuf> {
    let kept: Vec<_> = (0..sizes.long_lived)
        .map(|i| {
            let data = heap.alloc(1024);
            data.with_bytes_mut(|b| b[0] = (i % 256) as u8);
            data
        })
        .collect();
    if !sizes.hold.is_zero() {
        std::thread::sleep(sizes.hold);
    }
    kept
}

/// Run the allocation pattern comparison
pub fn run(ctx: &mut Context<'_>) -> Result<()> {
    let sizes = Sizes {
        small: ctx.scaled(200_000),
        large: ctx.scaled(200),
        long_lived: ctx.scaled(5000),
        hold: ctx.scaled_hold(Duration::from_millis(200)),
    };

    let mut rows: Vec<(&str, ExperimentResult)> = Vec::with_capacity(PATTERNS.len());
    for (i, pattern) in PATTERNS.iter().enumerate() {
        writeln!(ctx.out, "{}. {} ({})", i + 1, pattern.name, pattern.description)?;

        let heap = &ctx.heap;
        let measured = measure(heap, || (pattern.work)(heap, &sizes));
        let r = measured.result;
        drop(black_box(measured.value));

        writeln!(
            ctx.out,
            "   time: {}, GCs: {}, allocations: {}, pause: {}",
            ms(r.elapsed),
            r.collections,
            r.allocations,
            us(r.pause_total)
        )?;
        writeln!(ctx.out)?;
        ctx.record(pattern.name, &r);
        rows.push((pattern.name, r));
    }

    writeln!(ctx.out, "comparison:")?;
    let table = Table::new(&[12, 10, 6, 10, 10]);
    table.row(ctx.out, ["pattern", "time", "GCs", "allocs", "pause"])?;
    for (name, r) in &rows {
        table.row(
            ctx.out,
            [
                name.to_string(),
                ms(r.elapsed),
                r.collections.to_string(),
                r.allocations.to_string(),
                us(r.pause_total),
            ],
        )?;
    }
    Ok(())
}
