//! Periodic and time-of-day maintenance tasks.
//!
//! Each scheduled item runs on its own tokio task. Every body invocation is
//! wrapped so an `Err` or a panic is logged without killing the interval
//! loop or any sibling task. The registered task table stays introspectable
//! so startup wiring can be asserted on.

use chrono::{Local, NaiveTime, TimeDelta};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{error, info, warn};
use world_core::ShutdownState;

use crate::error::WorldError;

/// How a registered task fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed period; first firing one full period after registration.
    Every(Duration),
    /// First firing at the next wall-clock occurrence of this time of day,
    /// then every 24 hours.
    DailyAt(NaiveTime),
    /// Fires exactly once, immediately.
    Once,
}

/// One registered task, as visible to introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub schedule: Schedule,
}

/// Owns all maintenance tasks of one world node.
pub struct Scheduler {
    shutdown: ShutdownState,
    specs: Mutex<Vec<TaskSpec>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(shutdown: ShutdownState) -> Self {
        Self {
            shutdown,
            specs: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Registers a fixed-period task. A second registration under the same
    /// name is rejected, so a task can never run at double frequency.
    pub fn register_periodic<F, Fut>(&self, name: &str, period: Duration, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorldError>> + Send + 'static,
    {
        if !self.claim_name(name, Schedule::Every(period)) {
            return;
        }
        let task_name = name.to_string();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if shutdown.is_draining() {
                    info!("🛑 Scheduled task '{}' stopping", task_name);
                    break;
                }
                run_guarded(&task_name, body()).await;
            }
        });
        self.handles.lock().expect("handle list poisoned").push(handle);
    }

    /// Registers a task anchored to a wall-clock time of day, repeating
    /// every 24 hours after its first firing.
    pub fn register_daily<F, Fut>(&self, name: &str, at: NaiveTime, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorldError>> + Send + 'static,
    {
        if !self.claim_name(name, Schedule::DailyAt(at)) {
            return;
        }
        let task_name = name.to_string();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(until_next_occurrence(at)).await;
            let day = Duration::from_secs(24 * 60 * 60);
            let mut ticker = interval_at(Instant::now(), day);
            loop {
                ticker.tick().await;
                if shutdown.is_draining() {
                    info!("🛑 Scheduled task '{}' stopping", task_name);
                    break;
                }
                run_guarded(&task_name, body()).await;
            }
        });
        self.handles.lock().expect("handle list poisoned").push(handle);
    }

    /// Registers a one-shot task fired immediately.
    pub fn register_once<F, Fut>(&self, name: &str, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorldError>> + Send + 'static,
    {
        if !self.claim_name(name, Schedule::Once) {
            return;
        }
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            run_guarded(&task_name, body()).await;
        });
        self.handles.lock().expect("handle list poisoned").push(handle);
    }

    /// The registered task table.
    pub fn specs(&self) -> Vec<TaskSpec> {
        self.specs.lock().expect("spec list poisoned").clone()
    }

    /// How many tasks carry `name`. Always 0 or 1.
    pub fn registrations_named(&self, name: &str) -> usize {
        self.specs
            .lock()
            .expect("spec list poisoned")
            .iter()
            .filter(|spec| spec.name == name)
            .count()
    }

    /// Aborts every task loop. Used on shutdown after the shutdown flag has
    /// let in-flight bodies finish.
    pub fn abort_all(&self) {
        for handle in self.handles.lock().expect("handle list poisoned").drain(..) {
            handle.abort();
        }
    }

    fn claim_name(&self, name: &str, schedule: Schedule) -> bool {
        let mut specs = self.specs.lock().expect("spec list poisoned");
        if specs.iter().any(|spec| spec.name == name) {
            warn!("⚠️ Scheduled task '{}' already registered; ignoring duplicate", name);
            return false;
        }
        info!("⏰ Registered scheduled task '{}' ({:?})", name, schedule);
        specs.push(TaskSpec {
            name: name.to_string(),
            schedule,
        });
        true
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in self.handles.lock().expect("handle list poisoned").drain(..) {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.specs())
            .finish()
    }
}

/// Runs one task body, logging errors and panics instead of propagating.
async fn run_guarded<Fut>(name: &str, body: Fut)
where
    Fut: Future<Output = Result<(), WorldError>>,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!("❌ Scheduled task '{}' failed: {}", name, err),
        Err(_) => error!("💥 Scheduled task '{}' panicked", name),
    }
}

/// Duration until the next wall-clock occurrence of `at`.
fn until_next_occurrence(at: NaiveTime) -> Duration {
    let now = Local::now();
    let today = now.date_naive().and_time(at);
    let mut delta = today - now.naive_local();
    if delta < TimeDelta::zero() {
        delta += TimeDelta::days(1);
    }
    delta.to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_registration_is_rejected() {
        let scheduler = Scheduler::new(ShutdownState::new());
        scheduler.register_periodic("announce", Duration::from_secs(3600), || async {
            Ok(())
        });
        scheduler.register_periodic("announce", Duration::from_secs(3600), || async {
            Ok(())
        });
        assert_eq!(scheduler.registrations_named("announce"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_body_does_not_stop_the_loop() {
        let scheduler = Scheduler::new(ShutdownState::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        scheduler.register_periodic("flaky", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(WorldError::Internal("boom".to_string()))
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_shot_fires_once() {
        let scheduler = Scheduler::new(ShutdownState::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        scheduler.register_once("boot", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn next_occurrence_is_within_a_day() {
        let at = NaiveTime::from_hms_opt(12, 0, 0).expect("valid time");
        let wait = until_next_occurrence(at);
        assert!(wait <= Duration::from_secs(24 * 60 * 60));
    }
}
