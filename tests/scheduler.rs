//! Default job profiles driven through the real scheduler loop.

mod common;

use std::sync::Arc;
use std::time::Duration;

use boutique_insights::config::ScheduleConfig;
use boutique_insights::scheduler::profiles::{
    register_defaults, ERROR_PREDICTION_JOB, HEALTH_SUMMARY_JOB,
};
use boutique_insights::scheduler::{
    run_scheduler_loop, HistoryEntry, RunStatus, Scheduler, SchedulerError,
};
use boutique_insights::store::InMemoryStore;
use tokio_util::sync::CancellationToken;

use common::*;

async fn wait_for_run(scheduler: &Scheduler, id: &str) -> HistoryEntry {
    for _ in 0..300 {
        let job = scheduler.list().into_iter().find(|j| j.id == id).unwrap();
        if let Some(run) = job.last_run {
            if run.status != RunStatus::Running {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never finished", id);
}

#[tokio::test]
async fn test_defaults_register_once() {
    let h = harness(ScriptedModel::replying(LOW_RISK_REPLY));
    let scheduler = Scheduler::new(Arc::new(InMemoryStore::new()));
    let schedule = ScheduleConfig::default();

    tokio_test::assert_ok!(register_defaults(&scheduler, &h.service, &schedule));
    let jobs = scheduler.list();
    assert_eq!(jobs.len(), 3);
    let prediction = jobs.iter().find(|j| j.id == ERROR_PREDICTION_JOB).unwrap();
    assert_eq!(prediction.name, "Error Prediction");
    assert_eq!(prediction.interval_secs, 300);
    assert!(jobs.iter().all(|j| j.last_run.is_none() && !j.running));

    assert_eq!(
        register_defaults(&scheduler, &h.service, &schedule),
        Err(SchedulerError::DuplicateJob(ERROR_PREDICTION_JOB.to_string()))
    );
}

#[tokio::test]
async fn test_triggered_jobs_run_and_record_history() {
    let h = harness(ScriptedModel::replying("garbage"));
    let scheduler = Scheduler::new(Arc::new(InMemoryStore::new()));
    register_defaults(&scheduler, &h.service, &ScheduleConfig::default()).unwrap();

    let shutdown = CancellationToken::new();
    let engine = tokio::spawn(run_scheduler_loop(
        scheduler.clone(),
        Duration::from_millis(10),
        shutdown.clone(),
    ));

    scheduler.trigger_now(ERROR_PREDICTION_JOB).unwrap();
    scheduler.trigger_now(HEALTH_SUMMARY_JOB).unwrap();

    // No metrics: the quick check passes without a model call.
    let run = wait_for_run(&scheduler, ERROR_PREDICTION_JOB).await;
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.summary.unwrap().contains("analysis_type=rule_based"));

    // The summary needs the model, whose reply does not parse.
    let run = wait_for_run(&scheduler, HEALTH_SUMMARY_JOB).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.finished_at.is_some());

    assert!(scheduler.is_loop_running());
    shutdown.cancel();
    engine.await.unwrap();
    assert!(!scheduler.is_loop_running());
}

#[tokio::test]
async fn test_trigger_unknown_job() {
    let scheduler = Scheduler::new(Arc::new(InMemoryStore::new()));
    let err = tokio_test::assert_err!(scheduler.trigger_now("nightly_report"));
    assert_eq!(err, SchedulerError::UnknownJob("nightly_report".to_string()));
}
