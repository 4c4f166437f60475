//! Insight generators and the facade the API and scheduler call into.

pub mod cost;
pub mod health;

use std::sync::Arc;

use serde::Serialize;

pub use self::cost::{CostAnalyzer, CostRecommendation, CostReport};
pub use self::health::{HealthSummarizer, HealthSummary};

use crate::alert::AlertEmitter;
use crate::backend::{BackendError, MetricsBackend, SignalSink};
use crate::config::InsightsConfig;
use crate::detect::{ErrorPrediction, HealthCheckResult, PredictionEngine, QuickCheck, ReasoningModel};
use crate::metrics::MetricsReader;

/// Result of a model-backed insight. Either way the caller gets a 200.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InsightOutcome<T> {
    Generated { result: T, event_sent: bool },
    Failed { error: String },
}

impl<T> InsightOutcome<T> {
    pub fn is_generated(&self) -> bool {
        matches!(self, InsightOutcome::Generated { .. })
    }
}

/// Everything built from one backend, one sink and one model.
#[derive(Clone)]
pub struct InsightsService {
    backend: Arc<dyn MetricsBackend>,
    engine: PredictionEngine,
    costs: CostAnalyzer,
    health: HealthSummarizer,
}

impl InsightsService {
    pub fn new(
        backend: Arc<dyn MetricsBackend>,
        sink: Arc<dyn SignalSink>,
        model: Arc<dyn ReasoningModel>,
        config: &InsightsConfig,
    ) -> Self {
        let reader = MetricsReader::new(backend.clone());
        let emitter = AlertEmitter::new(sink, &config.backend.env);
        let quick = QuickCheck::new(reader.clone(), config.thresholds.clone());
        let timeout = config.analysis.timeout();

        Self {
            engine: PredictionEngine::new(
                quick.clone(),
                reader.clone(),
                model.clone(),
                emitter.clone(),
                timeout,
            ),
            costs: CostAnalyzer::new(reader.clone(), model.clone(), emitter.clone(), timeout),
            health: HealthSummarizer::new(quick, reader, model, emitter, timeout),
            backend,
        }
    }

    /// Tier 1 only.
    pub async fn quick_check(&self) -> HealthCheckResult {
        self.engine.quick_check().run().await
    }

    pub async fn predict_errors(&self, force: bool) -> ErrorPrediction {
        self.engine.predict_errors(force).await
    }

    pub async fn cost_analysis(&self) -> InsightOutcome<CostReport> {
        self.costs.analyze().await
    }

    pub async fn health_summary(&self) -> InsightOutcome<HealthSummary> {
        self.health.summarize().await
    }

    /// Reachability and credential check against the metrics backend.
    pub async fn backend_status(&self) -> Result<(), BackendError> {
        self.backend.validate().await
    }
}
