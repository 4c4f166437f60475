use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::InsightOutcome;
use crate::alert::AlertEmitter;
use crate::detect::model::{generate_within, ReasoningModel};
use crate::detect::{prompt, AnalysisError, QuickCheck};
use crate::metrics::MetricsReader;

/// LLM metrics window for the summary (seconds).
pub const SUMMARY_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSummary {
    pub overall_status: String,
    pub summary: String,
    pub highlights: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Default for HealthSummary {
    fn default() -> Self {
        Self {
            overall_status: "unknown".to_string(),
            summary: String::new(),
            highlights: Vec::new(),
            concerns: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Executive status summary from the quick-check metrics.
#[derive(Clone)]
pub struct HealthSummarizer {
    quick: QuickCheck,
    reader: MetricsReader,
    model: Arc<dyn ReasoningModel>,
    emitter: AlertEmitter,
    model_timeout: Duration,
}

impl HealthSummarizer {
    pub fn new(
        quick: QuickCheck,
        reader: MetricsReader,
        model: Arc<dyn ReasoningModel>,
        emitter: AlertEmitter,
        model_timeout: Duration,
    ) -> Self {
        Self {
            quick,
            reader,
            model,
            emitter,
            model_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn summarize(&self) -> InsightOutcome<HealthSummary> {
        match self.generate().await {
            Ok(mut summary) => {
                summary.overall_status = summary.overall_status.trim().to_ascii_lowercase();
                let event_sent = self.emitter.send_health_summary(&summary).await;
                self.emitter.insights_generated("health_summary", true).await;
                info!(status = %summary.overall_status, "health summary generated");
                InsightOutcome::Generated {
                    result: summary,
                    event_sent,
                }
            }
            Err(e) => {
                error!(error = %e, "health summary failed");
                self.emitter.insights_generated("health_summary", false).await;
                InsightOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn generate(&self) -> Result<HealthSummary, AnalysisError> {
        let check = self.quick.run().await;
        let llm = self.reader.llm_metrics("*", SUMMARY_WINDOW_SECS).await;

        let reply = generate_within(
            self.model.as_ref(),
            &prompt::health_prompt(&check.metrics, &check.concerns, &llm),
            self.model_timeout,
        )
        .await?;
        serde_json::from_value(prompt::extract_json(&reply)?)
            .map_err(|e| AnalysisError::Parse(e.to_string()))
    }
}
