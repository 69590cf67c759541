//! Scratch buffer pool for compiler I/O.
//!
//! Workers borrow an output buffer and an argv vector per compile;
//! guards return them cleared (not freed) on every exit path,
//! including unwinding.

use parking_lot::Mutex;
use std::sync::Arc;

/// Shared pool of scratch allocations, bounded by a checkout limit.
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    buffers: Mutex<Vec<Vec<u8>>>,
    argv: Mutex<Vec<Vec<String>>>,
    outstanding: Mutex<usize>,
    limit: usize,
}

/// One checkout: an output buffer plus an argv scratch vector.
pub struct Scratch {
    pub output: Vec<u8>,
    pub argv: Vec<String>,
    pool: Arc<PoolInner>,
    returned: bool,
}

impl BufferPool {
    /// `limit` bounds concurrent checkouts (typically workers + a few).
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffers: Mutex::new(Vec::new()),
                argv: Mutex::new(Vec::new()),
                outstanding: Mutex::new(0),
                limit: limit.max(1),
            }),
        }
    }

    /// Borrow scratch space; `None` when the checkout limit is reached.
    pub fn acquire(&self) -> Option<Scratch> {
        {
            let mut outstanding = self.inner.outstanding.lock();
            if *outstanding >= self.inner.limit {
                return None;
            }
            *outstanding += 1;
        }

        let output = self.inner.buffers.lock().pop().unwrap_or_default();
        let argv = self.inner.argv.lock().pop().unwrap_or_default();
        Some(Scratch {
            output,
            argv,
            pool: Arc::clone(&self.inner),
            returned: false,
        })
    }

    pub fn outstanding(&self) -> usize {
        *self.inner.outstanding.lock()
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if self.returned {
            return;
        }
        self.returned = true;

        let mut output = std::mem::take(&mut self.output);
        output.clear();
        let mut argv = std::mem::take(&mut self.argv);
        argv.clear();

        self.pool.buffers.lock().push(output);
        self.pool.argv.lock().push(argv);
        *self.pool.outstanding.lock() -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_cycle() {
        let pool = BufferPool::new(2);
        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        assert_eq!(pool.outstanding(), 2);

        drop(a);
        assert_eq!(pool.outstanding(), 1);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn test_buffers_returned_empty() {
        let pool = BufferPool::new(1);
        {
            let mut scratch = pool.acquire().unwrap();
            scratch.output.extend_from_slice(b"leftovers");
            scratch.argv.push("stale".to_string());
        }
        let scratch = pool.acquire().unwrap();
        assert!(scratch.output.is_empty());
        assert!(scratch.argv.is_empty());
    }

    #[test]
    fn test_release_on_panic() {
        let pool = BufferPool::new(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scratch = pool.acquire().unwrap();
            panic!("compile blew up");
        }));
        assert!(result.is_err());
        assert_eq!(pool.outstanding(), 0);
        assert!(pool.acquire().is_some());
    }
}
