use tracing::{debug, info};

use super::{HealthCheckResult, Thresholds};
use crate::metrics::{MetricQuery, MetricsReader};

/// Tier 1 look-back window (seconds).
pub const QUICK_CHECK_WINDOW_SECS: u64 = 900;

const ERROR_RATE_METRIC: &str = "llm.error.rate";
const LATENCY_METRIC: &str = "llm.request.duration";
const HALLUCINATION_METRIC: &str = "llm.recommendation.invalid_product_rate";

/// Rule-based check over three LLM health metrics. Only reads the metrics
/// backend; never calls the reasoning model.
#[derive(Clone)]
pub struct QuickCheck {
    reader: MetricsReader,
    thresholds: Thresholds,
}

impl QuickCheck {
    pub fn new(reader: MetricsReader, thresholds: Thresholds) -> Self {
        Self { reader, thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub async fn run(&self) -> HealthCheckResult {
        let error_rate = self.latest(ERROR_RATE_METRIC).await;
        let latency = self.latest(LATENCY_METRIC).await;
        let hallucination = self.latest(HALLUCINATION_METRIC).await;

        let result = self.thresholds.evaluate(error_rate, latency, hallucination);
        if result.needs_deep_analysis {
            info!(concerns = ?result.concerns, "quick check flagged concerns");
        } else {
            debug!(metrics = result.metrics.len(), "quick check passed");
        }
        result
    }

    async fn latest(&self, metric: &str) -> Option<f64> {
        let query = MetricQuery::new(metric)
            .and_then(|q| q.window_secs(QUICK_CHECK_WINDOW_SECS))
            .ok()?;
        self.reader.query(&query).await.and_then(|s| s.latest)
    }
}
