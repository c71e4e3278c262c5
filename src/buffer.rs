//! Reusable byte buffers for encoded responses.

use crate::config::PoolConfig;
use crate::models::pool::{FreeList, PoolStats};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Free list of byte buffers with a minimum useful capacity.
#[derive(Debug)]
pub struct BufferPool {
    buffers: FreeList<Vec<u8>>,
    pooled_size: usize,
    stats: Arc<PoolStats>,
}

impl BufferPool {
    pub fn new(pooled_size: usize, max_idle: usize, stats: Arc<PoolStats>) -> Self {
        Self {
            buffers: FreeList::new(max_idle),
            pooled_size,
            stats,
        }
    }

    pub fn from_config(config: &PoolConfig, stats: Arc<PoolStats>) -> Self {
        Self::new(config.pooled_buffer_size, config.max_idle_buffers, stats)
    }

    pub fn pooled_size(&self) -> usize {
        self.pooled_size
    }

    pub fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }

    /// An empty buffer with at least `pooled_size` capacity.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = match self.buffers.pop() {
            Some(buf) => {
                self.stats.record_acquire(false);
                buf
            }
            None => {
                self.stats.record_acquire(true);
                Vec::with_capacity(self.pooled_size)
            }
        };
        PooledBuffer { buf, pool: self }
    }

    /// Keep `buf` for reuse unless it is smaller than `pooled_size`.
    pub fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() < self.pooled_size {
            self.stats.record_release(false);
            return;
        }
        buf.clear();
        let kept = self.buffers.push(buf);
        self.stats.record_release(kept);
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.buffers.idle()
    }
}

/// A buffer that goes back to its pool when dropped.
pub struct PooledBuffer<'p> {
    buf: Vec<u8>,
    pool: &'p BufferPool,
}

impl PooledBuffer<'_> {
    /// Take the bytes out; the pool does not get the buffer back.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        // `into_vec` leaves an unallocated buffer behind
        if buf.capacity() > 0 {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> BufferPool {
        BufferPool::new(64, 2, Arc::new(PoolStats::new()))
    }

    #[test]
    fn test_buffer_is_recycled_empty() {
        let pool = pool();
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"hello");
        }
        assert_eq!(pool.idle(), 1);
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 64);
        assert_eq!(pool.stats().allocated(), 1);
    }

    #[test]
    fn test_small_buffer_is_discarded() {
        let pool = pool();
        pool.release(Vec::with_capacity(8));
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.stats().discarded(), 1);
    }

    #[test]
    fn test_into_vec_detaches() {
        let pool = pool();
        let mut buf = pool.acquire();
        buf.push(1);
        let bytes = buf.into_vec();
        assert_eq!(bytes, vec![1]);
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.stats().released(), 0);
    }

    #[test]
    fn test_idle_limit() {
        let pool = pool();
        for _ in 0..3 {
            pool.release(Vec::with_capacity(128));
        }
        assert_eq!(pool.idle(), 2);
        assert_eq!(pool.stats().discarded(), 1);
    }
}
