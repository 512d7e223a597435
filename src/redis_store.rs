use crate::error::{redis_error, serde_error, SessionResult};
use crate::id::SessionId;
use crate::model::{RecordSummary, SessionRecord};
use crate::store::{RecordIter, SessionStore};
use redis::{Client, Commands, Connection};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use time::OffsetDateTime;

const DEFAULT_NAMESPACE: &str = "websession";
const SCAN_BATCH: usize = 256;

/// Redis-backed session store. Each record is one JSON string under `<namespace>:session:<id>`.
pub struct RedisSessionStore {
    client: Client,
    namespace: String,
}

impl RedisSessionStore {
    /// Creates a store using a Redis URL and the default namespace prefix.
    pub fn from_url(url: impl AsRef<str>) -> SessionResult<Self> {
        let client = Client::open(url.as_ref()).map_err(redis_error)?;
        Ok(Self::with_namespace(client, DEFAULT_NAMESPACE))
    }

    /// Creates a store using a Redis URL and a custom namespace prefix.
    pub fn from_url_with_namespace(
        url: impl AsRef<str>,
        namespace: impl Into<String>,
    ) -> SessionResult<Self> {
        let client = Client::open(url.as_ref()).map_err(redis_error)?;
        Ok(Self::with_namespace(client, namespace))
    }

    pub fn with_namespace(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn conn(&self) -> SessionResult<Connection> {
        self.client.get_connection().map_err(redis_error)
    }

    fn key_prefix(&self) -> String {
        format!("{}:session:", self.namespace)
    }

    fn session_entry_key(&self, id: &SessionId) -> String {
        format!("{}{}", self.key_prefix(), id.as_str())
    }

    fn serialize(record: &SessionRecord) -> SessionResult<String> {
        serde_json::to_string(record).map_err(serde_error)
    }

    fn deserialize(payload: &str) -> SessionResult<SessionRecord> {
        serde_json::from_str(payload).map_err(serde_error)
    }
}

impl SessionStore for RedisSessionStore {
    fn get(&self, id: &SessionId) -> SessionResult<Option<SessionRecord>> {
        let mut conn = self.conn()?;
        let payload: Option<String> = conn.get(self.session_entry_key(id)).map_err(redis_error)?;
        payload.as_deref().map(Self::deserialize).transpose()
    }

    fn create(&self, id: &SessionId) -> SessionResult<()> {
        let payload = Self::serialize(&SessionRecord::empty(id.clone()))?;
        let mut conn = self.conn()?;
        conn.set_nx::<_, _, bool>(self.session_entry_key(id), payload)
            .map_err(redis_error)?;
        Ok(())
    }

    fn update(&self, id: &SessionId, data: &Map<String, Value>) -> SessionResult<OffsetDateTime> {
        let now = OffsetDateTime::now_utc();
        let record = SessionRecord {
            id: id.clone(),
            data: data.clone(),
            updated_at: Some(now),
        };
        let payload = Self::serialize(&record)?;
        let mut conn = self.conn()?;
        conn.set::<_, _, ()>(self.session_entry_key(id), payload)
            .map_err(redis_error)?;
        Ok(now)
    }

    fn delete(&self, id: &SessionId) -> SessionResult<()> {
        let mut conn = self.conn()?;
        let _: () = conn.del(self.session_entry_key(id)).map_err(redis_error)?;
        Ok(())
    }

    fn list(&self) -> SessionResult<RecordIter<'_>> {
        Ok(Box::new(ScanIter {
            conn: self.conn()?,
            pattern: format!("{}*", self.key_prefix()),
            cursor: 0,
            exhausted: false,
            pending: VecDeque::new(),
        }))
    }
}

/// Pages through the namespace with `SCAN`, fetching one batch of records at a time.
struct ScanIter {
    conn: Connection,
    pattern: String,
    cursor: u64,
    exhausted: bool,
    pending: VecDeque<String>,
}

impl ScanIter {
    fn fetch_batch(&mut self) -> SessionResult<()> {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(self.cursor)
            .arg("MATCH")
            .arg(&self.pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query(&mut self.conn)
            .map_err(redis_error)?;
        self.cursor = next;
        self.exhausted = next == 0;
        self.pending.extend(keys);
        Ok(())
    }
}

impl Iterator for ScanIter {
    type Item = SessionResult<RecordSummary>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(key) = self.pending.pop_front() {
                let payload: Option<String> = match self.conn.get(&key).map_err(redis_error) {
                    Ok(payload) => payload,
                    Err(err) => return Some(Err(err)),
                };
                // Deleted between SCAN and GET.
                let Some(payload) = payload else {
                    continue;
                };
                return Some(RedisSessionStore::deserialize(&payload).map(|r| r.summary()));
            }
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.fetch_batch() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
    }
}
