use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::history;
use super::{JobFn, ScheduledJob, SchedulerError};
use crate::store::KeyValueStore;

struct JobSlot {
    name: String,
    interval: Duration,
    next_run: DateTime<Utc>,
    running: bool,
    task: JobFn,
}

/// Repeating task registry. Cheap to clone; clones share the same jobs.
#[derive(Clone)]
pub struct Scheduler {
    jobs: Arc<Mutex<BTreeMap<String, JobSlot>>>,
    store: Arc<dyn KeyValueStore>,
    loop_running: Arc<AtomicBool>,
}

fn chrono_interval(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(3650))
}

impl Scheduler {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(BTreeMap::new())),
            store,
            loop_running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, JobSlot>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Register a job. Its first run is one interval from now.
    pub fn register(
        &self,
        id: &str,
        name: &str,
        interval: Duration,
        task: JobFn,
    ) -> Result<(), SchedulerError> {
        let mut jobs = self.lock();
        if jobs.contains_key(id) {
            return Err(SchedulerError::DuplicateJob(id.to_string()));
        }
        let next_run = Utc::now() + chrono_interval(interval);
        jobs.insert(
            id.to_string(),
            JobSlot {
                name: name.to_string(),
                interval,
                next_run,
                running: false,
                task,
            },
        );
        info!(job = %id, interval_secs = interval.as_secs(), %next_run, "job registered");
        Ok(())
    }

    /// Reset a job's next run to now.
    pub fn trigger_now(&self, id: &str) -> Result<DateTime<Utc>, SchedulerError> {
        let mut jobs = self.lock();
        let slot = jobs
            .get_mut(id)
            .ok_or_else(|| SchedulerError::UnknownJob(id.to_string()))?;
        let now = Utc::now();
        slot.next_run = now;
        info!(job = %id, "job triggered for immediate run");
        Ok(now)
    }

    pub fn list(&self) -> Vec<ScheduledJob> {
        let jobs = self.lock();
        jobs.iter()
            .map(|(id, slot)| ScheduledJob {
                id: id.clone(),
                name: slot.name.clone(),
                interval_secs: slot.interval.as_secs(),
                next_run: slot.next_run,
                running: slot.running,
                last_run: history::last_run(self.store.as_ref(), id),
            })
            .collect()
    }

    /// Claim every job due at `now`.
    ///
    /// A claimed job is marked running and rescheduled to `now + interval`.
    /// A due job that is still running is skipped for this round and
    /// rescheduled the same way.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<(String, JobFn)> {
        let mut jobs = self.lock();
        let mut due = Vec::new();
        for (id, slot) in jobs.iter_mut() {
            if slot.next_run > now {
                continue;
            }
            slot.next_run = now + chrono_interval(slot.interval);
            if slot.running {
                warn!(job = %id, "previous run still in flight, skipping");
                continue;
            }
            slot.running = true;
            due.push((id.clone(), slot.task.clone()));
        }
        due
    }

    /// Release a job claimed by [`take_due`](Self::take_due).
    pub fn finish(&self, id: &str) {
        if let Some(slot) = self.lock().get_mut(id) {
            slot.running = false;
            debug!(job = %id, next_run = %slot.next_run, "job released");
        }
    }

    pub fn is_loop_running(&self) -> bool {
        self.loop_running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_loop_running(&self, running: bool) {
        self.loop_running.store(running, Ordering::SeqCst);
    }
}
