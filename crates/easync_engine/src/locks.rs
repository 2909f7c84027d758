//! Per-scope commit locks.

use easync_store::Scope;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Serializes sync-key read-modify-write and batch apply per scope.
///
/// Sessions for different scopes never contend; sessions sharing a scope
/// (two workers on the same collection) run their commits one at a time.
#[derive(Debug, Default)]
pub struct ScopeLocks {
    locks: Mutex<HashMap<Scope, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock of `scope`.
    pub fn with_scope<T>(&self, scope: &Scope, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(self.locks.lock().entry(scope.clone()).or_default());
        let _guard = lock.lock();
        f()
    }

    /// Number of scopes seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns true if no scope was ever locked.
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_scope_is_serialized() {
        let locks = Arc::new(ScopeLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let scope = Scope::collection(1, "7");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                let scope = scope.clone();
                thread::spawn(move || {
                    locks.with_scope(&scope, || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn different_scopes_do_not_block() {
        let locks = ScopeLocks::new();
        let result = locks.with_scope(&Scope::hierarchy(1), || {
            locks.with_scope(&Scope::collection(1, "2"), || 42)
        });
        assert_eq!(result, 42);
        assert_eq!(locks.len(), 2);
    }
}
