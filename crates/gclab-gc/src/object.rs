//! Heap blocks and the handles that keep them alive

use parking_lot::Mutex;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A single heap allocation.
///
/// The heap owns one strong reference to every block it tracks; any further
/// reference comes from a [`GcBuf`], which is what makes a block reachable.
pub(crate) struct Block {
    bytes: Mutex<Box<[u8]>>,
    size: usize,
}

impl Block {
    pub(crate) fn zeroed(size: usize) -> Self {
        Self {
            bytes: Mutex::new(vec![0u8; size].into_boxed_slice()),
            size,
        }
    }

    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        Self {
            bytes: Mutex::new(bytes.into_boxed_slice()),
            size,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }
}

/// Handle to a heap block, viewing a range of it.
///
/// Cloning or slicing a handle never copies bytes: every view shares the
/// block and keeps all of it reachable, however short the view is.
#[derive(Clone)]
pub struct GcBuf {
    block: Arc<Block>,
    view: Range<usize>,
}

impl GcBuf {
    pub(crate) fn new(block: Arc<Block>) -> Self {
        let view = 0..block.size();
        Self { block, view }
    }

    /// Number of bytes in this view
    pub fn len(&self) -> usize {
        self.view.len()
    }

    /// True if the view is empty
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Bytes from the start of the view to the end of the block
    pub fn capacity(&self) -> usize {
        self.block.size() - self.view.start
    }

    /// Size of the whole block this view keeps alive
    pub fn block_size(&self) -> usize {
        self.block.size()
    }

    /// Re-slice within the capacity of this view.
    ///
    /// # Panics
    /// Panics if `range` is reversed or reaches past [`capacity`](Self::capacity).
    pub fn slice(&self, range: Range<usize>) -> GcBuf {
        assert!(
            range.start <= range.end && range.end <= self.capacity(),
            "slice {:?} out of capacity {}",
            range,
            self.capacity()
        );
        let start = self.view.start + range.start;
        GcBuf {
            block: Arc::clone(&self.block),
            view: start..self.view.start + range.end,
        }
    }

    /// Run `f` over the viewed bytes
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let bytes = self.block.bytes.lock();
        f(&bytes[self.view.clone()])
    }

    /// Run `f` over the viewed bytes mutably
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut bytes = self.block.bytes.lock();
        f(&mut bytes[self.view.clone()])
    }

    /// Copy the viewed bytes out of the heap
    pub fn to_vec(&self) -> Vec<u8> {
        self.with_bytes(<[u8]>::to_vec)
    }

    /// True if both handles keep the same block alive
    pub fn same_block(&self, other: &GcBuf) -> bool {
        Arc::ptr_eq(&self.block, &other.block)
    }
}

impl fmt::Debug for GcBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcBuf")
            .field("len", &self.len())
            .field("cap", &self.capacity())
            .field("block", &self.block.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_shares_block() {
        let buf = GcBuf::new(Arc::new(Block::zeroed(1024)));
        let head = buf.slice(0..100);

        assert_eq!(head.len(), 100);
        assert_eq!(head.capacity(), 1024);
        assert_eq!(head.block_size(), 1024);
        assert!(head.same_block(&buf));

        head.with_bytes_mut(|b| b[0] = 7);
        assert_eq!(buf.with_bytes(|b| b[0]), 7);
    }

    #[test]
    fn test_nested_slice_offsets() {
        let buf = GcBuf::new(Arc::new(Block::from_vec((0..=255).collect())));
        let tail = buf.slice(100..200);
        let inner = tail.slice(10..20);

        assert_eq!(tail.capacity(), 156);
        assert_eq!(inner.to_vec(), (110..120).collect::<Vec<u8>>());
    }

    #[test]
    #[should_panic(expected = "out of capacity")]
    fn test_slice_past_capacity() {
        let buf = GcBuf::new(Arc::new(Block::zeroed(16)));
        let _ = buf.slice(0..17);
    }
}
