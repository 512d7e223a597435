use crate::error::{invalid_argument, serde_error, SessionResult};
use crate::id::{self, SessionId, SessionSecret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Key/value payload of a session that records whether application code has changed it.
///
/// Every mutating method marks the map dirty, except while it is being
/// populated from a stored record.
#[derive(Clone, Debug, Default)]
pub struct SessionData {
    entries: Map<String, Value>,
    accessed: bool,
    modified: bool,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_dirty(&mut self) {
        if !self.accessed {
            self.modified = true;
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Deserializes the value stored under `key`, if any.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> SessionResult<Option<T>> {
        self.entries
            .get(key)
            .map(|value| serde_json::from_value(value.clone()).map_err(serde_error))
            .transpose()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Sets `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let previous = self.entries.insert(key.into(), value.into());
        self.mark_dirty();
        previous
    }

    /// Serializes `value` and stores it under `key`.
    pub fn insert_value<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> SessionResult<Option<Value>> {
        let value = serde_json::to_value(value).map_err(serde_error)?;
        Ok(self.insert(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.entries.remove(key);
        self.mark_dirty();
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.mark_dirty();
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.entries.retain(|key, value| keep(key, value));
        self.mark_dirty();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Borrows the raw map, e.g. for persistence.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Replaces the contents with a stored payload without marking the map dirty.
    fn populate(&mut self, entries: Map<String, Value>) {
        self.accessed = true;
        self.modified = false;
        self.entries.clear();
        for (key, value) in entries {
            self.entries.insert(key, value);
            self.mark_dirty();
        }
        self.accessed = false;
    }

    fn mark_clean(&mut self) {
        self.modified = false;
    }
}

impl PartialEq for SessionData {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// One persisted session as returned by a [`crate::SessionStore`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub data: Map<String, Value>,
    /// Time of the last successful update; `None` for a record that was created but never updated.
    pub updated_at: Option<OffsetDateTime>,
}

impl SessionRecord {
    /// An empty record as written when a new session is first persisted.
    pub fn empty(id: SessionId) -> Self {
        Self {
            id,
            data: Map::new(),
            updated_at: None,
        }
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry used by the reaper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSummary {
    pub id: SessionId,
    pub updated_at: Option<OffsetDateTime>,
}

/// In-memory view of one client's session plus its lifecycle flags.
#[derive(Clone, Debug)]
pub struct Session {
    id: Option<SessionId>,
    data: SessionData,
    is_new: bool,
    permanent: bool,
    invalidated: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session with no id and no data; nothing is persisted until it is saved.
    pub fn new() -> Self {
        Self {
            id: None,
            data: SessionData::new(),
            is_new: true,
            permanent: false,
            invalidated: false,
        }
    }

    /// Builds a session from a stored record. The result is not marked modified.
    pub fn from_record(record: SessionRecord) -> Self {
        let mut session = Self::new();
        session.hydrate(record);
        session
    }

    /// Loads `record` into this session, adopting its id and replacing all data.
    pub fn hydrate(&mut self, record: SessionRecord) {
        self.id = Some(record.id);
        self.is_new = false;
        self.invalidated = false;
        self.data.populate(record.data);
    }

    /// Assigns a freshly generated identifier. Called once, when a new session is first persisted;
    /// a session that already has an id keeps it and gets an error.
    pub fn create_id(&mut self, secret: &SessionSecret) -> SessionResult<&SessionId> {
        if self.id.is_some() {
            return Err(invalid_argument("session already has an identifier"));
        }
        let id = id::generate(secret)?;
        Ok(&*self.id.insert(id))
    }

    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }

    /// Shorthand for `data_mut().insert(..)`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(key, value)
    }

    /// Shorthand for `data().get(..)`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Shorthand for `data_mut().remove(..)`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// A session without data; saving it never creates a record.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_modified(&self) -> bool {
        self.data.is_modified()
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    pub fn set_permanent(&mut self, permanent: bool) {
        self.permanent = permanent;
    }

    /// True once the session's record has been deleted while this object was still held.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub(crate) fn mark_created(&mut self) {
        self.is_new = false;
    }

    pub(crate) fn discard_id(&mut self) {
        self.id = None;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.data.mark_clean();
    }

    pub(crate) fn invalidate(&mut self) {
        self.invalidated = true;
    }
}
