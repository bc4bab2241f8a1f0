//! Shared byte buffer pool
//!
//! Encode and decode borrow their working memory from a [`BufferPool`]. The
//! [`PooledBuffer`] guard hands the allocation back when it is dropped, which
//! covers early returns through `?` as well as panics unwinding a request.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Number of idle buffers kept by default
pub const DEFAULT_MAX_POOLED: usize = 64;

/// Buffers that grew beyond this capacity are dropped instead of pooled
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 256 * 1024;

// ----------------------------------------------------------------------------
// Buffer Pool
// ----------------------------------------------------------------------------

/// Pool of reusable byte buffers
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    max_retained_capacity: usize,
    outstanding: AtomicUsize,
}

impl BufferPool {
    /// Create a pool with the default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_POOLED, DEFAULT_MAX_RETAINED_CAPACITY)
    }

    /// Create a pool with explicit limits
    pub fn with_limits(max_pooled: usize, max_retained_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_pooled,
            max_retained_capacity,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Process-wide pool used when no explicit pool is configured
    pub fn shared() -> Arc<BufferPool> {
        static SHARED: OnceLock<Arc<BufferPool>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(BufferPool::new())).clone()
    }

    /// Borrow an empty buffer with at least `capacity` bytes reserved
    pub fn rent(self: &Arc<Self>, capacity: usize) -> PooledBuffer {
        let mut buffer = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .unwrap_or_default();

        buffer.clear();
        buffer.reserve(capacity);
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        PooledBuffer {
            buffer,
            pool: Arc::clone(self),
        }
    }

    /// Number of buffers currently rented out
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Number of idle buffers ready for reuse
    pub fn idle(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn give_back(&self, mut buffer: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);

        if buffer.capacity() > self.max_retained_capacity {
            return;
        }

        buffer.clear();
        let mut idle = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < self.max_pooled {
            idle.push(buffer);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Pooled Buffer Guard
// ----------------------------------------------------------------------------

/// A rented buffer, returned to its pool on drop
#[derive(Debug)]
pub struct PooledBuffer {
    buffer: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.pool.give_back(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_and_return() {
        let pool = Arc::new(BufferPool::new());
        {
            let mut buffer = pool.rent(16);
            buffer.extend_from_slice(b"abc");
            assert_eq!(pool.outstanding(), 1);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 1);

        let buffer = pool.rent(4);
        assert!(buffer.is_empty(), "reused buffers start empty");
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_oversized_buffers_are_not_retained() {
        let pool = Arc::new(BufferPool::with_limits(4, 8));
        {
            let mut buffer = pool.rent(0);
            buffer.resize(1024, 0);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_idle_limit() {
        let pool = Arc::new(BufferPool::with_limits(1, 1024));
        let a = pool.rent(1);
        let b = pool.rent(1);
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }
}
