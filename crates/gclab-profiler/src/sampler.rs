//! Periodic heap sampling on a background thread

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use gclab_gc::GcHeap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::snapshot::StatsSnapshot;

/// Samples a heap at a fixed interval
pub struct Sampler {
    heap: Arc<GcHeap>,
    interval: Duration,
    limit: Option<usize>,
}

/// A running sampler
pub struct SamplerHandle {
    stop: Sender<()>,
    samples: Arc<Mutex<Vec<StatsSnapshot>>>,
    thread: JoinHandle<()>,
}

impl Sampler {
    /// Sample `heap` every `interval`
    pub fn new(heap: Arc<GcHeap>, interval: Duration) -> Self {
        Self {
            heap,
            interval,
            limit: None,
        }
    }

    /// Stop on its own after `limit` samples
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Start sampling.
    ///
    /// `on_sample` runs on the sampling thread with the sample index.
    pub fn start<F>(self, mut on_sample: F) -> std::io::Result<SamplerHandle>
    where
        F: FnMut(usize, &StatsSnapshot) + Send + 'static,
    {
        let (stop, stopped): (Sender<()>, Receiver<()>) = bounded(1);
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);
        let Sampler {
            heap,
            interval,
            limit,
        } = self;

        let thread = std::thread::Builder::new()
            .name("gclab-sampler".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let snapshot = StatsSnapshot::capture(&heap);
                            let index = {
                                let mut samples = sink.lock();
                                samples.push(snapshot.clone());
                                samples.len() - 1
                            };
                            on_sample(index, &snapshot);
                            if limit.is_some_and(|limit| index + 1 >= limit) {
                                break;
                            }
                        }
                        recv(stopped) -> _ => break,
                    }
                }
            })?;

        Ok(SamplerHandle {
            stop,
            samples,
            thread,
        })
    }
}

impl SamplerHandle {
    /// Block until the sampler reaches its limit, then return the samples.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the sample callback.
    pub fn wait(self) -> Vec<StatsSnapshot> {
        if let Err(panic) = self.thread.join() {
            std::panic::resume_unwind(panic);
        }
        std::mem::take(&mut *self.samples.lock())
    }

    /// Stop sampling now and return the samples taken so far
    pub fn stop(self) -> Vec<StatsSnapshot> {
        let _ = self.stop.try_send(());
        self.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_limit() {
        let heap = GcHeap::new();
        let _kept = heap.alloc(100);

        let handle = Sampler::new(heap, Duration::from_millis(1))
            .with_limit(3)
            .start(|_, _| {})
            .unwrap();
        let samples = handle.wait();

        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.heap_bytes == 100));
    }

    #[test]
    fn test_sampler_stop() {
        let heap = GcHeap::new();
        let handle = Sampler::new(heap, Duration::from_secs(3600))
            .start(|_, _| {})
            .unwrap();

        let samples = handle.stop();
        assert!(samples.is_empty());
    }

    #[test]
    #[should_panic(expected = "sample callback failed")]
    fn test_callback_panic_reaches_caller() {
        let heap = GcHeap::new();
        Sampler::new(heap, Duration::from_millis(1))
            .with_limit(3)
            .start(|_, _| panic!("sample callback failed"))
            .unwrap()
            .wait();
    }

    #[test]
    fn test_sampler_callback_sees_indices() {
        let heap = GcHeap::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        Sampler::new(heap, Duration::from_millis(1))
            .with_limit(4)
            .start(move |i, _| sink.lock().push(i))
            .unwrap()
            .wait();

        assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
    }
}
