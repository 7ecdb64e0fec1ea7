//! Tracked worker threads
//!
//! The heap counts the workers it starts so experiments can see workers that
//! never finish, the same way a runtime reports its live task count.

use crossbeam_utils::CachePadded;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crate::error::{GcError, Result};

/// Registry of worker threads started through the heap
pub struct Workers {
    live: Arc<CachePadded<AtomicUsize>>,
    spawned: AtomicU64,
    stack_size: usize,
}

/// Decrements the live count when the worker body returns or unwinds
struct LiveGuard(Arc<CachePadded<AtomicUsize>>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Workers {
    /// Create a registry whose workers use `stack_size` byte stacks
    pub fn new(stack_size: usize) -> Self {
        Self {
            live: Arc::new(CachePadded::new(AtomicUsize::new(0))),
            spawned: AtomicU64::new(0),
            stack_size,
        }
    }

    /// Start a tracked worker.
    ///
    /// The live count already includes the worker when this returns.
    pub fn spawn<F, T>(&self, name: impl Into<String>, f: F) -> Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let name = name.into();
        self.live.fetch_add(1, Ordering::AcqRel);
        let guard = LiveGuard(Arc::clone(&self.live));

        let spawned = std::thread::Builder::new()
            .name(name.clone())
            .stack_size(self.stack_size)
            .spawn(move || {
                let _guard = guard;
                f()
            });

        match spawned {
            Ok(handle) => {
                self.spawned.fetch_add(1, Ordering::Relaxed);
                Ok(handle)
            }
            // the closure (and its guard) was dropped, so the count is already restored
            Err(source) => Err(GcError::Spawn { name, source }),
        }
    }

    /// Workers that have not finished
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Workers ever started
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_count_tracks_join() {
        let workers = Workers::new(64 * 1024);
        let (tx, rx) = std::sync::mpsc::channel::<()>();

        let handle = workers
            .spawn("blocked", move || {
                let _ = rx.recv();
            })
            .unwrap();
        assert_eq!(workers.live(), 1);

        drop(tx);
        handle.join().unwrap();
        assert_eq!(workers.live(), 0);
        assert_eq!(workers.spawned(), 1);
    }

    #[test]
    fn test_panicking_worker_is_not_counted() {
        let workers = Workers::new(64 * 1024);
        let handle = workers
            .spawn("boom", || -> u32 { panic!("worker failed") })
            .unwrap();
        assert!(handle.join().is_err());
        assert_eq!(workers.live(), 0);
    }

    #[test]
    fn test_worker_returns_value() {
        let workers = Workers::new(64 * 1024);
        let handle = workers.spawn("answer", || 6 * 7).unwrap();
        assert_eq!(handle.join().unwrap(), 42);
    }
}
