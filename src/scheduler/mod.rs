//! Fixed-interval job scheduler with on-demand re-trigger.
//!
//! Jobs are registered once at startup and live for the process lifetime.
//! The polling loop in [`engine`] runs whatever is due; [`Scheduler::trigger_now`]
//! pulls a job's next run forward to now.

pub mod engine;
pub mod history;
pub mod profiles;
pub mod registry;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

pub use self::engine::run_scheduler_loop;
pub use self::history::{HistoryEntry, RunStatus};
pub use self::registry::Scheduler;

#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    #[error("unknown job '{0}'")]
    UnknownJob(String),

    #[error("job '{0}' is already registered")]
    DuplicateJob(String),
}

/// Job body. Resolves to a one-line summary on success.
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync>;

/// Read-only view of a registered job.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    pub id: String,
    pub name: String,
    pub interval_secs: u64,
    pub next_run: DateTime<Utc>,
    pub running: bool,
    pub last_run: Option<HistoryEntry>,
}
