use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::history::{self, HistoryEntry};
use super::{JobFn, Scheduler};

/// Main scheduler execution loop.
///
/// Polls for due jobs every `tick` and runs each on its own task until
/// `shutdown` is cancelled. In-flight runs are left to finish on their own.
pub async fn run_scheduler_loop(scheduler: Scheduler, tick: Duration, shutdown: CancellationToken) {
    info!(tick_secs = tick.as_secs(), "scheduler engine started");
    scheduler.set_loop_running(true);

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        for (id, task) in scheduler.take_due(Utc::now()) {
            info!(job = %id, "job due");
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                run_job(&scheduler, &id, task).await;
            });
        }
    }

    scheduler.set_loop_running(false);
    info!("scheduler engine stopped");
}

/// Run one claimed job, record its history and release it.
pub(crate) async fn run_job(scheduler: &Scheduler, id: &str, task: JobFn) {
    let store = scheduler.store().clone();
    let entry = HistoryEntry::started(id);
    history::record(store.as_ref(), &entry);

    // A panicking job must still release its slot.
    let outcome = match tokio::spawn(task()).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(anyhow::anyhow!("job panicked")),
        Err(e) => Err(anyhow::anyhow!("job aborted: {}", e)),
    };
    match &outcome {
        Ok(summary) => info!(job = %id, summary = %summary, "job finished"),
        Err(e) => error!(job = %id, error = %e, "job failed"),
    }

    history::record(store.as_ref(), &entry.finish(&outcome));
    scheduler.finish(id);
}
