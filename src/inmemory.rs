use crate::clock::{Clock, SystemClock};
use crate::error::SessionResult;
use crate::id::SessionId;
use crate::model::SessionRecord;
use crate::store::{RecordIter, SessionStore};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use time::OffsetDateTime;

/// In-memory implementation backed by a concurrent hash map.
///
/// Records never expire on their own; removing stale sessions is the reaper's job.
pub struct InMemorySessionStore {
    entries: DashMap<SessionId, SessionRecord>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a store that stamps updates using `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &SessionId) -> SessionResult<Option<SessionRecord>> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }

    fn create(&self, id: &SessionId) -> SessionResult<()> {
        self.entries
            .entry(id.clone())
            .or_insert_with(|| SessionRecord::empty(id.clone()));
        Ok(())
    }

    fn update(&self, id: &SessionId, data: &Map<String, Value>) -> SessionResult<OffsetDateTime> {
        let now = self.now();
        match self.entries.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut occ) => {
                let record = occ.get_mut();
                record.data = data.clone();
                record.updated_at = Some(now);
            }
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                vac.insert(SessionRecord {
                    id: id.clone(),
                    data: data.clone(),
                    updated_at: Some(now),
                });
            }
        }
        Ok(now)
    }

    fn delete(&self, id: &SessionId) -> SessionResult<()> {
        self.entries.remove(id);
        Ok(())
    }

    fn list(&self) -> SessionResult<RecordIter<'_>> {
        // Snapshot first: iterating a DashMap holds shard read locks, and callers delete while
        // walking the listing. The summaries are small next to the records already held here.
        let summaries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        Ok(Box::new(summaries.into_iter().map(Ok)))
    }
}
