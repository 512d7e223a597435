use crate::error::SessionResult;
use crate::id::SessionId;
use crate::model::{RecordSummary, SessionRecord};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Listing of stored sessions, consumed one item at a time. Backends whose records live outside
/// the process (Redis) fetch items as the iterator advances, so a sweep never loads the whole
/// store. The in-memory backend hands out a snapshot of `(id, updated_at)` pairs instead.
pub type RecordIter<'a> = Box<dyn Iterator<Item = SessionResult<RecordSummary>> + Send + 'a>;

/// Durable session storage keyed by session id.
///
/// Implementations must give read-your-writes consistency within a process. Errors are reported
/// as [`crate::ErrorCode::Unavailable`] when the backend cannot be reached; a missing record is
/// `Ok(None)`, never an error.
pub trait SessionStore: Send + Sync + 'static {
    /// Fetches the record for `id`, if it exists.
    fn get(&self, id: &SessionId) -> SessionResult<Option<SessionRecord>>;

    /// Inserts an empty record with no update timestamp. Existing records are left untouched.
    fn create(&self, id: &SessionId) -> SessionResult<()>;

    /// Upserts the payload for `id` and stamps it with the current time, which is returned.
    fn update(&self, id: &SessionId, data: &Map<String, Value>) -> SessionResult<OffsetDateTime>;

    /// Removes the record. Deleting an unknown id succeeds.
    fn delete(&self, id: &SessionId) -> SessionResult<()>;

    /// Lists `(id, updated_at)` for every stored record. Callers may delete records while walking
    /// the listing.
    fn list(&self) -> SessionResult<RecordIter<'_>>;
}
