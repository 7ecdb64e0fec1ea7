//! Tuning for service-shaped workloads
//!
//! Three shapes: many short requests handled by a worker pool, a batch job
//! that accumulates and flushes, and long-lived connections that reuse
//! buffers through a pool.

use crossbeam_channel::unbounded;
use crossbeam_utils::sync::WaitGroup;
use gclab_gc::{BufferPool, GcHeap, GcPercent};
use gclab_profiler::{ExperimentResult, format_bytes, measure};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::context::Context;
use crate::error::{ExperimentError, Result};
use crate::report::{ms, us};

const REQUESTS: usize = 10_000;
const CONCURRENCY: usize = 50;
const REQUEST_BUFFER: usize = 4096;
const WEB_PERCENTS: [u32; 3] = [50, 100, 200];

const BATCH_ITEMS: usize = 50_000;
const ITEM_SIZE: usize = 2048;
const FLUSH_EVERY: usize = 5000;
const FORCE_GC_EVERY: usize = 10_000;
const BATCH_PERCENTS: [u32; 3] = [100, 400, 800];

const CONNECTIONS: usize = 500;
const MESSAGES_PER_CONN: usize = 200;
const CONN_BUFFER: usize = 4096;
const MESSAGE_GAP: Duration = Duration::from_micros(10);

/// Push `requests` ids through `concurrency` workers, one buffer per request
pub fn web_service(heap: &Arc<GcHeap>, requests: usize, concurrency: usize) -> Result<ExperimentResult> {
    let measured = measure(heap, || -> Result<()> {
        let (tx, rx) = unbounded::<usize>();
        for id in 0..requests {
            // the receiver is alive, so this cannot fail
            let _ = tx.send(id);
        }
        drop(tx);

        let wg = WaitGroup::new();
        let mut spawned = Ok(());
        for worker in 0..concurrency {
            let wg = wg.clone();
            let rx = rx.clone();
            let heap_ref = Arc::clone(heap);
            let started = heap.workers().spawn(format!("request-{worker}"), move || {
                let _wg = wg;
                for id in rx.iter() {
                    let data = heap_ref.alloc(REQUEST_BUFFER);
                    super::process_data(&data);
                    let _ = black_box(id * 2);
                }
            });
            if let Err(e) = started {
                spawned = Err(e);
                break;
            }
        }
        wg.wait();
        spawned?;
        Ok(())
    });
    measured.value?;
    Ok(measured.result)
}

/// Accumulate items, flushing the batch periodically and forcing a
/// collection on every other flush
pub fn batch(heap: &GcHeap, items: usize, flush_every: usize) -> ExperimentResult {
    let flush_every = flush_every.max(1);
    let force_every = flush_every * (FORCE_GC_EVERY / FLUSH_EVERY);
    let measured = measure(heap, || {
        let mut batch = Vec::with_capacity(flush_every + 1);
        for i in 0..items {
            let data = heap.alloc(ITEM_SIZE);
            super::process_data(&data);
            batch.push(data);

            if i > 0 && i % flush_every == 0 {
                batch.clear();
                if i % force_every == 0 {
                    heap.collect();
                }
            }
        }
        drop(black_box(batch));
    });
    measured.result
}

/// Run `connections` async tasks that each handle `messages` messages with
/// buffers from a shared pool
pub fn long_connections(
    heap: &Arc<GcHeap>,
    connections: usize,
    messages: usize,
    gap: Duration,
) -> Result<ExperimentResult> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .thread_name("gclab-conn")
        .build()
        .map_err(ExperimentError::Runtime)?;
    let pool = Arc::new(BufferPool::new(Arc::clone(heap), CONN_BUFFER));

    let measured = measure(heap, || {
        runtime.block_on(async {
            let mut tasks = JoinSet::new();
            for _ in 0..connections {
                let pool = Arc::clone(&pool);
                tasks.spawn(async move {
                    for _ in 0..messages {
                        let buffer = pool.get();
                        super::process_data(&buffer);
                        pool.put(buffer);
                        if !gap.is_zero() {
                            tokio::time::sleep(gap).await;
                        }
                    }
                });
            }

            while let Some(joined) = tasks.join_next().await {
                joined.map_err(|e| ExperimentError::WorkerFailed(e.to_string()))?;
            }
            Ok::<_, ExperimentError>(())
        })
    });
    measured.value?;
    Ok(measured.result)
}

fn per_request(elapsed: Duration, requests: usize) -> Duration {
    let nanos = elapsed.as_nanos() / requests.max(1) as u128;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Run the service-shaped experiment
pub fn run(ctx: &mut Context<'_>) -> Result<()> {
    writeln!(ctx.out, "1. high-concurrency web service")?;
    let requests = ctx.scaled(REQUESTS);
    let concurrency = ctx.scaled(CONCURRENCY);
    writeln!(ctx.out, "{requests} requests, concurrency {concurrency}")?;
    for percent in WEB_PERCENTS {
        let heap = ctx.heap_with(GcPercent::Percent(percent));
        let r = web_service(&heap, requests, concurrency)?;
        writeln!(
            ctx.out,
            "  percent={}: {} requests in {}, GCs {}, mean latency {}",
            percent,
            requests,
            ms(r.elapsed),
            r.collections,
            us(per_request(r.elapsed, requests))
        )?;
        ctx.record(format!("web percent={percent}"), &r);
    }
    writeln!(ctx.out, "conclusion: request handlers do well at percent 100-200")?;

    writeln!(ctx.out)?;
    writeln!(ctx.out, "2. batch processing")?;
    let items = ctx.scaled(BATCH_ITEMS);
    let flush_every = ctx.scaled(FLUSH_EVERY);
    writeln!(ctx.out, "{items} items of {ITEM_SIZE} bytes")?;
    for percent in BATCH_PERCENTS {
        let heap = ctx.heap_with(GcPercent::Percent(percent));
        let r = batch(&heap, items, flush_every);
        writeln!(
            ctx.out,
            "  percent={}: {} items in {}, GCs {}, throughput {:.0} items/sec",
            percent,
            items,
            ms(r.elapsed),
            r.collections,
            r.throughput(items as u64)
        )?;
        ctx.record(format!("batch percent={percent}"), &r);
    }
    writeln!(ctx.out, "conclusion: batch jobs favour throughput at percent 400-800")?;

    writeln!(ctx.out)?;
    writeln!(ctx.out, "3. long-lived connections")?;
    let connections = ctx.scaled(CONNECTIONS);
    let messages = ctx.scaled(MESSAGES_PER_CONN);
    let heap = Arc::clone(&ctx.heap);
    let r = long_connections(&heap, connections, messages, MESSAGE_GAP)?;
    let total = (connections * messages) as u64;
    writeln!(
        ctx.out,
        "{} connections x {} messages in {}",
        connections,
        messages,
        ms(r.elapsed)
    )?;
    writeln!(
        ctx.out,
        "GCs: {}, throughput: {:.0} messages/sec",
        r.collections,
        r.throughput(total)
    )?;
    writeln!(
        ctx.out,
        "heap growth per connection: {}",
        format_bytes(r.heap_after.saturating_sub(r.heap_before) / connections as u64)
    )?;
    writeln!(ctx.out, "conclusion: pooled buffers keep long connections cheap")?;
    ctx.record("long connections", &r);
    Ok(())
}
