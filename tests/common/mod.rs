#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use time::OffsetDateTime;
use websession::error::unavailable;
use websession::inmemory::InMemorySessionStore;
use websession::store::RecordIter;
use websession::{
    Clock, ManualClock, ManualScheduler, SessionConfig, SessionId, SessionManager, SessionRecord,
    SessionResult, SessionSecret, SessionStore,
};

/// In-memory store that counts calls per operation and can be switched into an outage.
pub struct CountingStore {
    inner: InMemorySessionStore,
    pub gets: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    down: AtomicBool,
    failing_delete: Mutex<Option<SessionId>>,
    stale_listing: AtomicBool,
}

impl CountingStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemorySessionStore::with_clock(clock),
            gets: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            down: AtomicBool::new(false),
            failing_delete: Mutex::new(None),
            stale_listing: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Makes `delete` fail for `id` only.
    pub fn fail_delete_for(&self, id: Option<SessionId>) {
        *self.failing_delete.lock() = id;
    }

    /// Makes `list` report every record as never updated, as if the listing was taken before
    /// the latest saves landed. `get` still returns the real record.
    pub fn set_stale_listing(&self, stale: bool) {
        self.stale_listing.store(stale, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn check(&self) -> SessionResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable("store offline"));
        }
        Ok(())
    }
}

impl SessionStore for CountingStore {
    fn get(&self, id: &SessionId) -> SessionResult<Option<SessionRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(id)
    }

    fn create(&self, id: &SessionId) -> SessionResult<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.create(id)
    }

    fn update(&self, id: &SessionId, data: &Map<String, Value>) -> SessionResult<OffsetDateTime> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.update(id, data)
    }

    fn delete(&self, id: &SessionId) -> SessionResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if self.failing_delete.lock().as_ref() == Some(id) {
            return Err(unavailable("delete rejected"));
        }
        self.inner.delete(id)
    }

    fn list(&self) -> SessionResult<RecordIter<'_>> {
        self.check()?;
        let listing = self.inner.list()?;
        if !self.stale_listing.load(Ordering::SeqCst) {
            return Ok(listing);
        }
        Ok(Box::new(listing.map(|item| {
            item.map(|mut summary| {
                summary.updated_at = None;
                summary
            })
        })))
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<CountingStore>,
    pub scheduler: ManualScheduler,
    pub manager: SessionManager,
}

pub fn harness(config: SessionConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
    let store = Arc::new(CountingStore::new(clock.clone()));
    let scheduler = ManualScheduler::new();
    let manager = SessionManager::builder(
        store.clone(),
        SessionSecret::from_bytes(b"test-secret".to_vec()).expect("secret"),
    )
    .config(config)
    .clock(clock.clone())
    .build(&scheduler)
    .expect("manager");
    Harness {
        clock,
        store,
        scheduler,
        manager,
    }
}

/// Opens a fresh session, stores `key=value`, saves it, and returns the new id.
pub fn persisted_session(manager: &SessionManager, key: &str, value: Value) -> SessionId {
    let handle = manager.open(None).expect("open");
    handle.lock().insert(key, value);
    manager.save(&handle).expect("save");
    handle.id().expect("id assigned")
}
