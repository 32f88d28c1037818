//! Snapshot cell for state that is read on every emission and written rarely.
//!
//! Backed by `ArcSwap`: readers get a consistent `Arc<T>` without locking, writers publish a
//! whole new value.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// `Shared<T>` gives lock-free snapshots and atomic replacement of a value.
#[derive(Debug)]
pub struct Shared<T> {
    inner: Arc<ArcSwap<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> Shared<T> {
    /// Create a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(value)) }
    }

    /// Snapshot the current value (cheap clone of Arc).
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Replace the value entirely.
    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Replace the value and return the previous one.
    pub fn swap(&self, value: T) -> Arc<T> {
        self.inner.swap(Arc::new(value))
    }

    /// Read-copy-update. `f` may run more than once under contention; no update is lost.
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&T) -> T,
    {
        self.inner.rcu(|cur| Arc::new(f(cur)));
    }
}

#[cfg(test)]
mod tests {
    use super::Shared;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn load_store_update() {
        let cell = Shared::new(1);
        assert_eq!(*cell.load(), 1);
        cell.store(2);
        assert_eq!(*cell.load(), 2);
        cell.update(|v| v + 3);
        assert_eq!(*cell.load(), 5);
        assert_eq!(*cell.swap(9), 5);
        assert_eq!(*cell.load(), 9);
    }

    #[test]
    fn snapshot_outlives_replacement() {
        let cell = Shared::new(String::from("old"));
        let snap = cell.load();
        cell.store(String::from("new"));
        assert_eq!(*snap, "old");
        assert_eq!(*cell.load(), "new");
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let cell = Arc::new(Shared::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        cell.update(|v| v + 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*cell.load(), 4000);
    }
}
