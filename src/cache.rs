//! Unbounded FIFO backlog of admitted requests.
//!
//! The cache absorbs bursts that the bounded request queue cannot accept;
//! the scheduler's frontier pump is its only reader. It is deliberately
//! unbounded: admission control (de-duplication, depth, domain) happens
//! before a request reaches it.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::base::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Running,
    Closed,
}

impl CacheStatus {
    fn name(self) -> &'static str {
        match self {
            CacheStatus::Running => "running",
            CacheStatus::Closed => "closed",
        }
    }
}

#[derive(Debug)]
struct Inner {
    queue: VecDeque<Request>,
    status: CacheStatus,
}

#[derive(Debug)]
pub struct RequestCache {
    inner: Mutex<Inner>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                status: CacheStatus::Running,
            }),
        }
    }

    /// Appends a request. Returns `false` after close.
    pub fn put(&self, req: Request) -> bool {
        let mut inner = self.inner.lock();
        if inner.status == CacheStatus::Closed {
            return false;
        }
        inner.queue.push_back(req);
        true
    }

    /// Removes and returns the oldest request, or `None` when the cache is
    /// empty or closed.
    pub fn get(&self) -> Option<Request> {
        let mut inner = self.inner.lock();
        if inner.status == CacheStatus::Closed {
            return None;
        }
        inner.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated capacity of the backing buffer; a best-effort snapshot.
    pub fn capacity(&self) -> usize {
        self.inner.lock().queue.capacity()
    }

    pub fn status(&self) -> CacheStatus {
        self.inner.lock().status
    }

    pub fn close(&self) {
        self.inner.lock().status = CacheStatus::Closed;
    }

    pub fn summary(&self) -> String {
        let inner = self.inner.lock();
        format!(
            "status: {}, length: {}, capacity: {}",
            inner.status.name(),
            inner.queue.len(),
            inner.queue.capacity()
        )
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}
