//! Execution history tracking for scheduled runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::store::KeyValueStore;

const KEY_PREFIX: &str = "scheduler:last_run:";

/// A record of one scheduled execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: Uuid,
    pub job_id: String,
    pub status: RunStatus,
    pub summary: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl HistoryEntry {
    pub fn started(job_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_id: job_id.to_string(),
            status: RunStatus::Running,
            summary: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(mut self, outcome: &anyhow::Result<String>) -> Self {
        self.finished_at = Some(Utc::now());
        match outcome {
            Ok(summary) => {
                self.status = RunStatus::Success;
                self.summary = Some(summary.clone());
            }
            Err(e) => {
                self.status = RunStatus::Failed;
                self.summary = Some(format!("{:#}", e));
            }
        }
        self
    }
}

/// Overwrite the last-run record for the entry's job.
pub fn record(store: &dyn KeyValueStore, entry: &HistoryEntry) {
    match serde_json::to_value(entry) {
        Ok(v) => store.put(&format!("{}{}", KEY_PREFIX, entry.job_id), v),
        Err(e) => warn!(job = %entry.job_id, error = %e, "failed to serialize run history"),
    }
}

pub fn last_run(store: &dyn KeyValueStore, job_id: &str) -> Option<HistoryEntry> {
    let value = store.get(&format!("{}{}", KEY_PREFIX, job_id))?;
    serde_json::from_value(value).ok()
}
