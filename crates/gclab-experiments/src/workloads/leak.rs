//! Leaked workers and slice retention

use crossbeam_channel::bounded;
use gclab_profiler::{StatsSnapshot, format_bytes};
use std::hint::black_box;
use std::time::Duration;

use crate::context::Context;
use crate::error::Result;

const LEAKED_WORKERS: usize = 100;
const LARGE_SLICE: usize = 10 * 1024 * 1024;
const VIEW_LEN: usize = 100;

/// Worker counts around a leak
#[derive(Debug, Clone, Copy)]
pub struct LeakOutcome {
    /// Live workers before spawning
    pub before: usize,
    /// Live workers after the settle window
    pub after: usize,
    /// Workers spawned
    pub spawned: usize,
}

impl LeakOutcome {
    /// Workers that are still blocked
    pub fn leaked(&self) -> usize {
        self.after.saturating_sub(self.before)
    }
}

/// Heap readings around the slice-retention fix
#[derive(Debug, Clone, Copy)]
pub struct SliceOutcome {
    /// Size of the large buffer
    pub released: usize,
    /// Length of the short view
    pub view_len: usize,
    /// Capacity of the short view
    pub view_capacity: usize,
    /// Heap bytes while the view pins the large buffer
    pub retained_heap: u64,
    /// Heap bytes once the copy exists, before the release
    pub before_release: u64,
    /// Heap bytes after the release and a forced collection
    pub after_release: u64,
}

/// Spawn `count` workers that wait forever on a channel nobody sends on.
///
/// The workers are never cleaned up.
pub fn leak_workers(ctx: &mut Context<'_>, count: usize) -> Result<LeakOutcome> {
    let workers = ctx.heap.workers();
    let before = workers.live();
    let heap_before = StatsSnapshot::capture(&ctx.heap);
    writeln!(ctx.out, "live workers before: {before}")?;

    for id in 0..count {
        let (tx, rx) = bounded::<u64>(0);
        workers.spawn(format!("leaked-{id}"), move || {
            // holding the sender means recv can never observe a disconnect
            let _sender = tx;
            let _ = rx.recv();
        })?;
    }

    ctx.hold(Duration::from_millis(100));

    let after = workers.live();
    let heap_after = StatsSnapshot::capture(&ctx.heap);
    let outcome = LeakOutcome {
        before,
        after,
        spawned: count,
    };

    writeln!(ctx.out, "live workers after: {after}")?;
    writeln!(ctx.out, "leaked workers: {}", outcome.leaked())?;
    writeln!(
        ctx.out,
        "heap growth: {}, stacks reserved: {}",
        format_bytes(heap_after.heap_bytes.saturating_sub(heap_before.heap_bytes)),
        format_bytes((outcome.leaked() * ctx.heap.config().worker_stack_size) as u64)
    )?;
    writeln!(
        ctx.out,
        "conclusion: every blocked worker keeps its stack until the process exits"
    )?;
    Ok(outcome)
}

/// Pin a large buffer through a short view, then fix it by copying
pub fn slice_retention(ctx: &mut Context<'_>, size: usize) -> Result<SliceOutcome> {
    let heap = &ctx.heap;

    writeln!(ctx.out, "creating a {} buffer...", format_bytes(size as u64))?;
    let large = heap.alloc(size);
    super::process_data(&large);

    // the view is short but keeps the whole buffer reachable
    let view = large.slice(0..VIEW_LEN.min(size));
    drop(large);
    heap.collect();

    let retained = StatsSnapshot::capture(heap);
    writeln!(
        ctx.out,
        "heap with the view alive: {}",
        format_bytes(retained.heap_bytes)
    )?;
    writeln!(
        ctx.out,
        "view length: {}, capacity: {}",
        view.len(),
        view.capacity()
    )?;

    writeln!(ctx.out, "fix: copy the needed part...")?;
    let proper = heap.alloc_copy(&view);
    let before = StatsSnapshot::capture(heap);
    let (view_len, view_capacity) = (view.len(), view.capacity());
    drop(view);

    heap.collect();
    let after = StatsSnapshot::capture(heap);

    writeln!(ctx.out, "heap after the fix: {}", format_bytes(after.heap_bytes))?;
    writeln!(
        ctx.out,
        "saved: {}",
        format_bytes(before.heap_bytes.saturating_sub(after.heap_bytes))
    )?;
    writeln!(
        ctx.out,
        "conclusion: a view keeps its whole block alive; copy what you keep"
    )?;
    drop(black_box(proper));

    ctx.record("slice-retention", &after.delta_since(&retained));
    Ok(SliceOutcome {
        released: size,
        view_len,
        view_capacity,
        retained_heap: retained.heap_bytes,
        before_release: before.heap_bytes,
        after_release: after.heap_bytes,
    })
}

fn slice_size(ctx: &Context<'_>) -> usize {
    ctx.scaled(LARGE_SLICE).max(1024 * 1024)
}

/// Run the leak experiment
pub fn run(ctx: &mut Context<'_>) -> Result<()> {
    writeln!(ctx.out, "1. worker leak")?;
    if ctx.config.allow_leaks {
        leak_workers(ctx, LEAKED_WORKERS)?;
    } else {
        writeln!(
            ctx.out,
            "skipped: leaking workers is opt-in, rerun with --allow-leaks"
        )?;
    }

    writeln!(ctx.out)?;
    writeln!(ctx.out, "2. slice retention")?;
    let size = slice_size(ctx);
    slice_retention(ctx, size)?;
    Ok(())
}

/// Run slice retention on its own
pub fn run_slice(ctx: &mut Context<'_>) -> Result<()> {
    let size = slice_size(ctx);
    slice_retention(ctx, size)?;
    Ok(())
}
