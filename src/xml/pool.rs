//! Process-wide pool of document buffers.
//!
//! Every load reads the whole file into memory before parsing; the
//! buffers are recycled through a free list so repeated loads do not
//! reallocate. Acquire/release is mutex-guarded and safe to use from
//! the validation pipeline's workers.

use std::ops::{Deref, DerefMut};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static POOL: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Buffers larger than this are dropped instead of pooled.
const MAX_POOLED_CAPACITY: usize = 4 * 1024 * 1024;

/// A pooled `String`; returns itself to the pool on drop.
pub struct PooledBuffer(String);

/// Take a cleared buffer from the pool, or allocate a fresh one.
pub fn acquire_buffer() -> PooledBuffer {
    PooledBuffer(POOL.lock().pop().unwrap_or_default())
}

impl Deref for PooledBuffer {
    type Target = String;

    fn deref(&self) -> &String {
        &self.0
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.0
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.0);
        if buf.capacity() <= MAX_POOLED_CAPACITY {
            buf.clear();
            POOL.lock().push(buf);
        }
    }
}
