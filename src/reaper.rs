use crate::error::SessionResult;
use crate::id::SessionId;
use crate::manager::SessionCore;
use crate::scheduler::PeriodicTask;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

pub const REAPER_OWNER: &str = "System";
pub const REAPER_TASK_NAME: &str = "Session Reaper";

/// Whether a record last updated at `updated_at` has outlived `lifetime`. Records that were
/// created but never updated always count as stale.
pub(crate) fn is_stale(
    updated_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
    lifetime: Duration,
) -> bool {
    match updated_at {
        Some(updated_at) => now - updated_at >= lifetime,
        None => true,
    }
}

/// Outcome of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    /// Listed as stale but refreshed by a save before it could be removed.
    pub refreshed: usize,
    pub failed: usize,
}

/// Periodic sweep that deletes sessions older than the configured lifetime from both the store
/// and the cache.
#[derive(Clone)]
pub struct Reaper {
    core: Arc<SessionCore>,
}

impl Reaper {
    pub(crate) fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    /// Walks the store listing once. Individual failures are logged and skipped; the sweep
    /// itself never fails.
    pub fn sweep(&self) -> SweepReport {
        let lifetime = self.core.config.effective_lifetime();
        let now = self.core.clock.now();
        let mut report = SweepReport::default();
        debug!("session reaper started");

        let listing = match self.core.store.list() {
            Ok(listing) => listing,
            Err(err) => {
                warn!(error = %err, "session reaper could not list sessions");
                report.failed += 1;
                return report;
            }
        };

        for item in listing {
            let summary = match item {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(error = %err, "session reaper skipped an unreadable record");
                    report.failed += 1;
                    continue;
                }
            };
            report.scanned += 1;
            if !is_stale(summary.updated_at, now, lifetime) {
                continue;
            }

            match self.reap(&summary.id, lifetime) {
                Ok(true) => {
                    debug!(session_id = %summary.id, updated_at = ?summary.updated_at, "deleted expired session");
                    report.deleted += 1;
                }
                Ok(false) => report.refreshed += 1,
                Err(err) => {
                    warn!(session_id = %summary.id, error = %err, "failed to delete expired session");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            refreshed = report.refreshed,
            failed = report.failed,
            "session reaper finished"
        );
        report
    }

    /// Re-reads the record under the id lock so a save that landed after the listing wins.
    fn reap(&self, id: &SessionId, lifetime: Duration) -> SessionResult<bool> {
        self.core.locks.with_lock(id, || {
            if let Some(record) = self.core.store.get(id)? {
                if !is_stale(record.updated_at, self.core.clock.now(), lifetime) {
                    return Ok(false);
                }
            }
            self.core.remove_locked(id)?;
            Ok(true)
        })
    }

    /// Wraps the sweep as a system-owned periodic task.
    pub fn into_task(self, period: std::time::Duration) -> PeriodicTask {
        PeriodicTask::new(REAPER_OWNER, REAPER_TASK_NAME, period, move || {
            self.sweep();
            true
        })
        .immutable(true)
    }
}
