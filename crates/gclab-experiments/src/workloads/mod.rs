//! Allocation workloads
//!
//! Each module prints its own progress and results. Modules whose outcome
//! tests need to inspect also expose a function returning it.

use gclab_gc::GcBuf;

pub mod basic;
pub mod concurrent;
pub mod leak;
pub mod monitor;
pub mod patterns;
pub mod pool;
pub mod scale;
pub mod tuning;

/// Touch every byte so the allocation is really used
pub(crate) fn process_data(buf: &GcBuf) {
    buf.with_bytes_mut(|bytes| {
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i % 256) as u8;
        }
    });
}

/// Write `value` every `stride` bytes
pub(crate) fn touch(buf: &GcBuf, stride: usize, value: u8) {
    buf.with_bytes_mut(|bytes| {
        for b in bytes.iter_mut().step_by(stride.max(1)) {
            *b = value;
        }
    });
}
