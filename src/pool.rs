//! Bounded, reusable cache of worker entities.
//!
//! The pool is the cardinality governor of the engine: dispatchers spawn a
//! task per event, but a task that cannot take an entity fails fast instead
//! of queueing. `take` and `release` never block.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crossbeam::queue::ArrayQueue;

use crate::errors::PoolError;

/// A worker entity that can live in a [`Pool`].
pub trait Entity: Send + 'static {
    /// Stable diagnostic id assigned at construction.
    fn id(&self) -> u32;
}

/// Fixed-capacity entity pool. The buffer is filled eagerly from the factory;
/// entities circulate between the buffer and callers for the life of the
/// pool.
#[derive(Debug)]
pub struct Pool<T: Entity> {
    entities: ArrayQueue<T>,
    total: u32,
    used: AtomicU32,
    closed: AtomicBool,
}

impl<T: Entity> Pool<T> {
    /// Builds a pool of `total` entities, each produced by one `factory`
    /// call.
    pub fn new(total: u32, mut factory: impl FnMut() -> T) -> Result<Self, PoolError> {
        if total == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let entities = ArrayQueue::new(total as usize);
        for _ in 0..total {
            // Cannot overflow: the queue was sized for exactly `total`.
            let _ = entities.push(factory());
        }
        Ok(Self {
            entities,
            total,
            used: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Removes one entity. Fails fast with [`PoolError::Empty`] when every
    /// entity is currently taken.
    pub fn take(&self) -> Result<T, PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        match self.entities.pop() {
            Some(entity) => {
                self.used.fetch_add(1, Ordering::SeqCst);
                Ok(entity)
            }
            None => Err(PoolError::Empty),
        }
    }

    /// Hands an entity back. A release with no matching take, or one that
    /// would grow the buffer past capacity, fails with [`PoolError::Full`].
    /// After close the release fails with [`PoolError::Closed`], but the
    /// entity still leaves the used count: the caller is abandoning it, and
    /// idle detection must converge even after shutdown.
    pub fn release(&self, entity: T) -> Result<(), PoolError> {
        if self.closed.load(Ordering::Acquire) {
            drop(entity);
            let _ = self
                .used
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    used.checked_sub(1)
                });
            return Err(PoolError::Closed);
        }
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_sub(1)
            })
            .map_err(|_| PoolError::Full)?;
        if self.entities.push(entity).is_err() {
            self.used.fetch_add(1, Ordering::SeqCst);
            return Err(PoolError::Full);
        }
        Ok(())
    }

    /// Marks the pool closed; later takes and releases fail with
    /// [`PoolError::Closed`]. Entities still out stay with their holders.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of entities currently held by callers.
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Probe {
        id: u32,
    }

    impl Entity for Probe {
        fn id(&self) -> u32 {
            self.id
        }
    }

    fn probe_pool(total: u32) -> Pool<Probe> {
        let mut next = 0;
        Pool::new(total, || {
            let p = Probe { id: next };
            next += 1;
            p
        })
        .unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            Pool::new(0, || Probe { id: 0 }),
            Err(PoolError::ZeroCapacity)
        ));
    }

    #[test]
    fn used_plus_free_stays_at_total() {
        let pool = probe_pool(3);
        assert_eq!(pool.total(), 3);
        assert_eq!(pool.used(), 0);

        let a = pool.take().unwrap();
        let b = pool.take().unwrap();
        assert_eq!(pool.used(), 2);

        pool.release(a).unwrap();
        assert_eq!(pool.used(), 1);
        pool.release(b).unwrap();
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn take_fails_fast_when_drained() {
        let pool = probe_pool(1);
        let held = pool.take().unwrap();
        assert_eq!(pool.take().unwrap_err(), PoolError::Empty);
        pool.release(held).unwrap();
        assert!(pool.take().is_ok());
    }

    #[test]
    fn release_without_take_is_rejected() {
        let pool = probe_pool(2);
        assert_eq!(
            pool.release(Probe { id: 99 }).unwrap_err(),
            PoolError::Full
        );
    }

    #[test]
    fn double_release_is_rejected() {
        let pool = probe_pool(2);
        let taken = pool.take().unwrap();
        pool.release(taken).unwrap();
        assert_eq!(
            pool.release(Probe { id: 98 }).unwrap_err(),
            PoolError::Full
        );
    }

    #[test]
    fn closed_pool_refuses_both_directions() {
        let pool = probe_pool(2);
        let out = pool.take().unwrap();
        pool.close();
        assert_eq!(pool.take().unwrap_err(), PoolError::Closed);
        assert_eq!(pool.release(out).unwrap_err(), PoolError::Closed);
        // The abandoned entity no longer counts as held.
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn entities_keep_their_ids_across_cycles() {
        let pool = probe_pool(1);
        let first = pool.take().unwrap();
        let id = first.id();
        pool.release(first).unwrap();
        let again = pool.take().unwrap();
        assert_eq!(again.id(), id);
    }
}
