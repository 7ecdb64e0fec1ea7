//! Live heap sampling under background churn

use crossbeam_channel::unbounded;
use gclab_gc::GcHeap;
use gclab_profiler::{Sampler, StatsSnapshot, format_bytes};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::context::Context;
use crate::error::{ExperimentError, Result};
use crate::report::us;

const CHURN_BLOCK: usize = 1024;
const CHURN_WINDOW: usize = 1000;

/// Allocate until `stop` is set, keeping a window of recent blocks alive
fn churn(heap: &GcHeap, stop: &AtomicBool) -> u64 {
    let mut window = Vec::with_capacity(CHURN_WINDOW);
    let mut allocated = 0u64;
    while !stop.load(Ordering::Acquire) {
        let data = heap.alloc(CHURN_BLOCK);
        super::touch(&data, 128, (allocated % 256) as u8);
        if window.len() == CHURN_WINDOW {
            window.swap_remove((allocated as usize) % CHURN_WINDOW);
        }
        window.push(data);
        allocated += 1;
        if allocated % 64 == 0 {
            std::thread::yield_now();
        }
    }
    allocated
}

fn sample_line(index: usize, s: &StatsSnapshot) -> String {
    format!(
        "[{:>3}] heap: {:>10}  objects: {:>7}  GCs: {:>5}  pause: {:>10}  max recent: {}",
        index + 1,
        format_bytes(s.heap_bytes),
        s.heap_objects,
        s.collections,
        us(s.pause_total),
        us(s.max_recent_pause)
    )
}

/// Run the monitor experiment
pub fn run(ctx: &mut Context<'_>) -> Result<()> {
    let heap = Arc::clone(&ctx.heap);
    let interval = ctx.config.monitor_interval;
    let samples = ctx.config.monitor_samples.max(1);
    writeln!(
        ctx.out,
        "sampling every {} for {} samples under background churn",
        us(interval),
        samples
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    let churn_heap = Arc::clone(&heap);
    let churn_stop = Arc::clone(&stop);
    let churner = heap
        .workers()
        .spawn("churn", move || churn(&churn_heap, &churn_stop))?;

    // lines go through a channel so only this thread writes the report
    let (tx, rx) = unbounded();
    let sampling = Sampler::new(Arc::clone(&heap), interval)
        .with_limit(samples)
        .start(move |index, snapshot| {
            let _ = tx.send(sample_line(index, snapshot));
        })
        .map_err(ExperimentError::Io);

    let sampler = match sampling {
        Ok(sampler) => sampler,
        Err(e) => {
            stop.store(true, Ordering::Release);
            let _ = churner.join();
            return Err(e);
        }
    };

    // ends once the sampler thread drops its sender
    let reported = rx.iter().try_for_each(|line| writeln!(ctx.out, "{line}"));
    let taken = match reported {
        Ok(()) => sampler.wait(),
        Err(_) => sampler.stop(),
    };

    // the churn worker must not outlive the run, even when the report failed
    stop.store(true, Ordering::Release);
    let joined = churner.join();
    reported?;
    let allocated = joined.map_err(|_| ExperimentError::WorkerFailed("churn".to_string()))?;

    if let (Some(first), Some(last)) = (taken.first(), taken.last()) {
        let r = last.delta_since(first);
        writeln!(ctx.out)?;
        writeln!(
            ctx.out,
            "{} samples, {} churn allocations, {} GCs between first and last sample",
            taken.len(),
            allocated,
            r.collections
        )?;
        writeln!(
            ctx.out,
            "heap {} -> {}, peak {}",
            format_bytes(r.heap_before),
            format_bytes(r.heap_after),
            format_bytes(r.heap_peak)
        )?;
        ctx.record("monitor", &r);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExperimentConfig;
    use std::io::{self, Write};
    use std::time::Duration;

    /// Accepts everything except sample lines
    struct ClosesOnSample;

    impl Write for ClosesOnSample {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.contains(&b'[') {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "report closed"))
            } else {
                Ok(buf.len())
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_report_stops_churn() {
        let config = ExperimentConfig {
            monitor_interval: Duration::from_millis(1),
            monitor_samples: 50,
            ..ExperimentConfig::default()
        };
        let heap = GcHeap::new();
        let mut out = ClosesOnSample;
        let mut ctx = Context::new(Arc::clone(&heap), &config, &mut out);

        let err = run(&mut ctx).unwrap_err();
        assert!(matches!(err, ExperimentError::Io(_)));
        assert_eq!(heap.workers().live(), 0);

        let mallocs = heap.stats().mallocs;
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(heap.stats().mallocs, mallocs);
    }

    #[test]
    fn test_churn_stops_on_flag() {
        let heap = GcHeap::new();
        let stop = AtomicBool::new(true);

        assert_eq!(churn(&heap, &stop), 0);
        assert_eq!(heap.stats().mallocs, 0);
    }

    #[test]
    fn test_sample_line_is_one_based() {
        let heap = GcHeap::new();
        let line = sample_line(0, &StatsSnapshot::capture(&heap));

        assert!(line.starts_with("[  1]"));
        assert!(line.contains("GCs:"));
    }
}
