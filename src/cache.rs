use crate::id::SessionId;
use crate::model::Session;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Shared, live session object handed to request handlers.
///
/// Requests that hit the cache for the same id receive clones of the same handle. Do not hold the
/// guard returned by [`SessionHandle::lock`] while calling into the manager.
#[derive(Clone, Debug, Default)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock()
    }

    /// Whether both handles refer to the same live session object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Copy of the session's id, taken under the lock.
    pub fn id(&self) -> Option<SessionId> {
        self.0.lock().id().cloned()
    }
}

/// Process-wide map from id to live session.
///
/// Entries are added on load and save and only leave on explicit removal; there is no capacity
/// bound or eviction policy.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: DashMap<SessionId, SessionHandle>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// Inserts `handle`, replacing any existing entry for `id`.
    pub fn put(&self, id: SessionId, handle: SessionHandle) {
        self.entries.insert(id, handle);
    }

    pub fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        self.entries.remove(id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
