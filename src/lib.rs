#![forbid(unsafe_code)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod cookie;
pub mod error;
pub mod id;
pub mod inmemory;
mod lock;
pub mod manager;
pub mod model;
pub mod reaper;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod scheduler;
pub mod store;

use std::sync::Arc;

pub use cache::{SessionCache, SessionHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CookieConfig, SessionConfig};
pub use cookie::{ClearCookie, CookieDirective, SetCookie};
pub use error::{ErrorCode, SessionError, SessionResult};
pub use id::{SessionId, SessionSecret};
pub use manager::{SessionManager, SessionManagerBuilder};
pub use model::{RecordSummary, Session, SessionData, SessionRecord};
pub use reaper::{Reaper, SweepReport};
pub use scheduler::{ManualScheduler, PeriodicTask, Scheduler};
pub use store::SessionStore;

#[cfg(feature = "tokio")]
pub use scheduler::TokioScheduler;

/// Backend selection for [`create_session_store`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionBackendConfig {
    InMemory,
    #[cfg(feature = "redis")]
    RedisUrl(String),
}

/// Builds the configured store behind a shared trait object.
pub fn create_session_store(config: SessionBackendConfig) -> SessionResult<Arc<dyn SessionStore>> {
    match config {
        SessionBackendConfig::InMemory => Ok(Arc::new(inmemory::InMemorySessionStore::new())),
        #[cfg(feature = "redis")]
        SessionBackendConfig::RedisUrl(url) => {
            Ok(Arc::new(redis_store::RedisSessionStore::from_url(url)?))
        }
    }
}
