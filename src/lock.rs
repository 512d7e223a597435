use crate::id::SessionId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-id mutual exclusion for the save, delete, and load critical sections.
///
/// Distinct ids never contend. A lock entry lives only while some caller holds or waits on it.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `id`.
    pub(crate) fn with_lock<R>(&self, id: &SessionId, f: impl FnOnce() -> R) -> R {
        let lock = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // Clones are only handed out under the shard lock, so a count of one means nobody else
        // holds or waits on this entry.
        self.locks
            .remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
