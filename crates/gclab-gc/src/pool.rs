//! Reuse pool for fixed-size buffers
//!
//! Cached buffers are dropped after every collection cycle, so a pool only
//! saves allocations between cycles and never pins memory indefinitely.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::heap::GcHeap;
use crate::object::GcBuf;

/// Pool of `size`-byte buffers allocated from one heap
pub struct BufferPool {
    heap: Arc<GcHeap>,
    size: usize,
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    free: Vec<GcBuf>,
    /// Collection count the cached buffers belong to
    epoch: u64,
}

impl BufferPool {
    /// Create an empty pool
    pub fn new(heap: Arc<GcHeap>, size: usize) -> Self {
        let epoch = heap.num_gc();
        Self {
            heap,
            size,
            inner: Mutex::new(PoolInner {
                free: Vec::new(),
                epoch,
            }),
        }
    }

    /// Take a cached buffer or allocate a new one.
    ///
    /// Reused buffers keep whatever bytes the previous user left in them.
    pub fn get(&self) -> GcBuf {
        let cached = {
            let mut inner = self.inner.lock();
            self.drop_stale(&mut inner);
            inner.free.pop()
        };
        cached.unwrap_or_else(|| self.heap.alloc(self.size))
    }

    /// Return a buffer to the pool
    pub fn put(&self, buf: GcBuf) {
        let mut inner = self.inner.lock();
        self.drop_stale(&mut inner);
        inner.free.push(buf);
    }

    /// Buffers currently cached
    pub fn cached(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Size of the buffers this pool hands out
    pub fn buffer_size(&self) -> usize {
        self.size
    }

    fn drop_stale(&self, inner: &mut PoolInner) {
        let epoch = self.heap.num_gc();
        if epoch != inner.epoch {
            inner.free.clear();
            inner.epoch = epoch;
        }
    }
}
