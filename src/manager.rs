use crate::cache::{SessionCache, SessionHandle};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::cookie::CookieDirective;
use crate::error::{internal, SessionResult};
use crate::id::{SessionId, SessionSecret};
use crate::lock::KeyLocks;
use crate::model::Session;
use crate::reaper::{is_stale, Reaper};
use crate::scheduler::Scheduler;
use crate::store::SessionStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

/// State shared by the manager and the reaper.
pub(crate) struct SessionCore {
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) cache: Arc<SessionCache>,
    pub(crate) locks: KeyLocks,
    pub(crate) config: SessionConfig,
    pub(crate) clock: Arc<dyn Clock>,
    secret: SessionSecret,
}

impl SessionCore {
    /// Deletes `id` from the store, then from the cache. The caller holds the id lock and must
    /// not hold the guard of the cached handle.
    pub(crate) fn remove_locked(&self, id: &SessionId) -> SessionResult<()> {
        self.store.delete(id)?;
        if let Some(handle) = self.cache.remove(id) {
            handle.lock().invalidate();
        }
        Ok(())
    }
}

/// Opens, saves, and deletes sessions on behalf of the HTTP layer.
///
/// Reads go cache first, then store. Writes go to the store and then refresh the cache, so the
/// cache never holds a session whose record the store has lost. Clones share all state.
#[derive(Clone)]
pub struct SessionManager {
    core: Arc<SessionCore>,
}

pub struct SessionManagerBuilder {
    store: Arc<dyn SessionStore>,
    secret: SessionSecret,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    cache: Arc<SessionCache>,
}

impl SessionManagerBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Uses an existing cache instead of a fresh empty one.
    pub fn cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Validates the configuration, builds the manager, and registers the reaper with `scheduler`.
    pub fn build(self, scheduler: &dyn Scheduler) -> SessionResult<SessionManager> {
        self.config.validate()?;
        let period = self.config.reaper_period();
        let manager = SessionManager {
            core: Arc::new(SessionCore {
                store: self.store,
                cache: self.cache,
                locks: KeyLocks::new(),
                config: self.config,
                clock: self.clock,
                secret: self.secret,
            }),
        };
        scheduler.register_periodic(manager.reaper().into_task(period))?;
        Ok(manager)
    }
}

impl SessionManager {
    pub fn builder(store: Arc<dyn SessionStore>, secret: SessionSecret) -> SessionManagerBuilder {
        SessionManagerBuilder {
            store,
            secret,
            config: SessionConfig::default(),
            clock: Arc::new(SystemClock),
            cache: Arc::new(SessionCache::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.core.cache
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.core.store
    }

    /// A reaper sharing this manager's store, cache, and locks.
    pub fn reaper(&self) -> Reaper {
        Reaper::new(self.core.clone())
    }

    /// Returns the session for the id carried by the request cookie.
    ///
    /// No id, an unknown id, or a record past its lifetime all yield a fresh session. Store
    /// failures are returned to the caller rather than masked by a fresh session.
    pub fn open(&self, cookie_value: Option<&str>) -> SessionResult<SessionHandle> {
        let Some(raw) = cookie_value.filter(|raw| !raw.is_empty()) else {
            return Ok(SessionHandle::new(Session::new()));
        };
        let id = SessionId::new(raw);

        if let Some(handle) = self.core.cache.get(&id) {
            debug!(session_id = %id, "loaded session from cache");
            return Ok(handle);
        }

        self.core.locks.with_lock(&id, || {
            // Another request may have loaded it while we waited.
            if let Some(handle) = self.core.cache.get(&id) {
                return Ok(handle);
            }

            let Some(record) = self.core.store.get(&id)? else {
                debug!(session_id = %id, "unknown session id, starting a new session");
                return Ok(SessionHandle::new(Session::new()));
            };

            let lifetime = self.core.config.effective_lifetime();
            if is_stale(record.updated_at, self.core.clock.now(), lifetime) {
                debug!(session_id = %id, updated_at = ?record.updated_at, "stored session expired, starting a new session");
                self.core.remove_locked(&id)?;
                return Ok(SessionHandle::new(Session::new()));
            }

            let handle = SessionHandle::new(Session::from_record(record));
            self.core.cache.put(id.clone(), handle.clone());
            debug!(session_id = %id, "loaded session from store");
            Ok(handle)
        })
    }

    /// Persists the session if needed and tells the caller what to do with the cookie.
    ///
    /// Returns `None` when the session is untouched and no cookie change is needed. Do not hold
    /// the handle's guard while calling this.
    pub fn save(&self, handle: &SessionHandle) -> SessionResult<Option<CookieDirective>> {
        let id = {
            let mut session = handle.lock();
            match session.id() {
                Some(id) => id.clone(),
                None => {
                    if session.is_empty() {
                        return Ok(self.clear_if_modified(&session));
                    }
                    session.create_id(&self.core.secret)?.clone()
                }
            }
        };
        self.core
            .locks
            .with_lock(&id, || self.save_locked(&id, handle))
    }

    fn save_locked(
        &self,
        id: &SessionId,
        handle: &SessionHandle,
    ) -> SessionResult<Option<CookieDirective>> {
        let mut session = handle.lock();

        if session.is_invalidated() {
            debug!(session_id = %id, "session was deleted while in use, not saving");
            return Ok(Some(CookieDirective::clear(&self.core.config.cookie)));
        }

        if session.is_empty() {
            let directive = self.clear_if_modified(&session);
            if session.is_new() {
                session.discard_id();
            } else {
                debug!(session_id = %id, "session emptied, deleting");
                self.core.store.delete(id)?;
                if let Some(cached) = self.core.cache.remove(id) {
                    if !cached.ptr_eq(handle) {
                        cached.lock().invalidate();
                    }
                }
                session.invalidate();
            }
            return Ok(directive);
        }

        if !self.should_persist(&session) {
            return Ok(None);
        }
        let expires = match self.expiration_time(&session) {
            Ok(expires) => expires,
            Err(err) => {
                if session.is_new() {
                    session.discard_id();
                }
                return Err(err);
            }
        };

        if session.is_new() {
            if let Err(err) = self.core.store.create(id) {
                session.discard_id();
                return Err(err);
            }
            session.mark_created();
            debug!(session_id = %id, "created a new session");
        }

        debug!(session_id = %id, "saving session");
        self.core.store.update(id, session.data().as_map())?;
        session.mark_persisted();
        self.core.cache.put(id.clone(), handle.clone());

        Ok(Some(CookieDirective::set(
            &self.core.config.cookie,
            id,
            expires,
        )))
    }

    /// Removes the session from the store and the cache. Unknown ids are ignored.
    pub fn delete(&self, id: &SessionId) -> SessionResult<()> {
        debug!(session_id = %id, "deleting session");
        self.core
            .locks
            .with_lock(id, || self.core.remove_locked(id))
    }

    /// Cookie expiry for `session` if it were saved now.
    pub fn expiration_time(&self, session: &Session) -> SessionResult<OffsetDateTime> {
        let config = &self.core.config;
        let lifetime = if session.is_permanent() {
            config
                .permanent_lifetime()
                .unwrap_or_else(|| config.expiration_delta())
        } else {
            config.expiration_delta()
        };
        self.core
            .clock
            .now()
            .checked_add(lifetime)
            .ok_or_else(|| internal("session expiry is outside the supported date range"))
    }

    fn should_persist(&self, session: &Session) -> bool {
        session.is_new()
            || session.is_modified()
            || (session.is_permanent() && self.core.config.refresh_each_request)
    }

    fn clear_if_modified(&self, session: &Session) -> Option<CookieDirective> {
        session
            .is_modified()
            .then(|| CookieDirective::clear(&self.core.config.cookie))
    }
}
