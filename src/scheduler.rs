//! Capability for registering periodic background work.
//!
//! The manager only depends on the [`Scheduler`] trait. [`ManualScheduler`] runs tasks when asked,
//! and [`TokioScheduler`] (feature `tokio`) drives them on runtime timers.

use crate::error::{invalid_argument, SessionResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Body of a periodic task. Returns whether the run succeeded.
pub type TaskFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// A named unit of work to be invoked every `period`.
#[derive(Clone)]
pub struct PeriodicTask {
    pub owner: String,
    pub name: String,
    pub period: Duration,
    /// System-owned tasks that users must not cancel or edit.
    pub immutable: bool,
    pub job: TaskFn,
}

impl PeriodicTask {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        period: Duration,
        job: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            period,
            immutable: false,
            job: Arc::new(job),
        }
    }

    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    pub fn run(&self) -> bool {
        (self.job)()
    }
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("period", &self.period)
            .field("immutable", &self.immutable)
            .finish_non_exhaustive()
    }
}

pub trait Scheduler: Send + Sync {
    fn register_periodic(&self, task: PeriodicTask) -> SessionResult<()>;
}

fn ensure_period(task: &PeriodicTask) -> SessionResult<()> {
    if task.period.is_zero() {
        return Err(invalid_argument(format!(
            "periodic task '{}' must have a non-zero period",
            task.name
        )));
    }
    Ok(())
}

/// Keeps registered tasks and runs them only when told to.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<PeriodicTask>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<PeriodicTask> {
        self.tasks.lock().clone()
    }

    /// Runs the task registered under `name`, returning its result.
    pub fn run(&self, name: &str) -> Option<bool> {
        let task = self
            .tasks
            .lock()
            .iter()
            .find(|task| task.name == name)
            .cloned()?;
        Some(task.run())
    }

    /// Runs every registered task once; returns how many reported success.
    pub fn run_all(&self) -> usize {
        let tasks = self.tasks();
        tasks.iter().filter(|task| task.run()).count()
    }
}

impl Scheduler for ManualScheduler {
    fn register_periodic(&self, task: PeriodicTask) -> SessionResult<()> {
        ensure_period(&task)?;
        self.tasks.lock().push(task);
        Ok(())
    }
}

#[cfg(feature = "tokio")]
pub use tokio_impl::TokioScheduler;

#[cfg(feature = "tokio")]
mod tokio_impl {
    use super::{ensure_period, PeriodicTask, Scheduler};
    use crate::error::{invalid_argument, SessionResult};
    use parking_lot::Mutex;
    use tokio::runtime::Handle;
    use tokio::task::JoinHandle;
    use tokio::time::{interval_at, Instant, MissedTickBehavior};
    use tracing::{debug, warn};

    /// Runs each task on a runtime interval. Task bodies execute on the blocking pool since
    /// store calls are synchronous. Dropping the scheduler aborts its tasks.
    pub struct TokioScheduler {
        handle: Handle,
        tasks: Mutex<Vec<JoinHandle<()>>>,
    }

    impl TokioScheduler {
        pub fn new(handle: Handle) -> Self {
            Self {
                handle,
                tasks: Mutex::new(Vec::new()),
            }
        }

        /// Binds to the runtime of the calling context.
        pub fn current() -> SessionResult<Self> {
            Handle::try_current()
                .map(Self::new)
                .map_err(|err| invalid_argument(format!("no tokio runtime available: {err}")))
        }

        pub fn task_count(&self) -> usize {
            self.tasks.lock().len()
        }

        pub fn shutdown(&self) {
            for task in self.tasks.lock().drain(..) {
                task.abort();
            }
        }
    }

    impl Drop for TokioScheduler {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    impl Scheduler for TokioScheduler {
        fn register_periodic(&self, task: PeriodicTask) -> SessionResult<()> {
            ensure_period(&task)?;
            let period = task.period;
            debug!(owner = %task.owner, task = %task.name, ?period, "scheduling periodic task");
            let join = self.handle.spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let job = task.job.clone();
                    match tokio::task::spawn_blocking(move || job()).await {
                        Ok(true) => debug!(task = %task.name, "periodic task completed"),
                        Ok(false) => warn!(task = %task.name, "periodic task reported failure"),
                        Err(err) => warn!(task = %task.name, error = %err, "periodic task aborted"),
                    }
                }
            });
            self.tasks.lock().push(join);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn manual_scheduler_runs_on_demand() {
        let scheduler = ManualScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        scheduler
            .register_periodic(PeriodicTask::new(
                "System",
                "tick",
                Duration::from_secs(60),
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                },
            ))
            .expect("register");

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.run("tick"), Some(true));
        assert_eq!(scheduler.run_all(), 1);
        assert_eq!(scheduler.run("missing"), None);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_period_is_rejected() {
        let scheduler = ManualScheduler::new();
        let err = scheduler
            .register_periodic(PeriodicTask::new("System", "bad", Duration::ZERO, || true))
            .expect_err("zero period");
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }
}
