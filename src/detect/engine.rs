use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, instrument};

use super::model::{generate_within, ReasoningModel};
use super::prompt;
use super::quick::QuickCheck;
use super::{AnalysisError, AnalysisType, HealthCheckResult, PredictionResult, PredictionStatus};
use crate::alert::{AlertEmitter, EmitReport};
use crate::metrics::MetricsReader;

/// Probability reported when the quick check passes.
pub const HEALTHY_PROBABILITY: f64 = 0.1;

/// Window of the error bundle fed to deep analysis.
pub const ERROR_CONTEXT_WINDOW_SECS: u64 = 3600;
/// Window of the LLM bundle fed to deep analysis.
pub const LLM_CONTEXT_WINDOW_SECS: u64 = 86_400;

/// Terminal state of one classifier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// Tier 1 passed; no model call was made.
    Healthy,
    /// Deep analysis produced a parsed prediction.
    Predicted,
    /// Deep analysis ran but produced no usable prediction.
    AnalysisError,
}

/// Result returned to callers of [`PredictionEngine::predict_errors`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPrediction {
    pub outcome: PredictionOutcome,
    pub analysis_type: AnalysisType,
    pub probability: f64,
    pub status: PredictionStatus,
    /// Tier 1 concerns; empty when Tier 1 was skipped.
    pub concerns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    pub recommended_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub emitted: EmitReport,
}

impl ErrorPrediction {
    fn healthy(check: HealthCheckResult, emitted: EmitReport) -> Self {
        Self {
            outcome: PredictionOutcome::Healthy,
            analysis_type: AnalysisType::RuleBased,
            probability: HEALTHY_PROBABILITY,
            status: PredictionStatus::Healthy,
            concerns: check.concerns,
            message: Some("All metrics within normal thresholds".to_string()),
            root_cause: None,
            recommended_actions: Vec::new(),
            prediction: None,
            error: None,
            emitted,
        }
    }

    fn predicted(concerns: Vec<String>, prediction: PredictionResult, emitted: EmitReport) -> Self {
        Self {
            outcome: PredictionOutcome::Predicted,
            analysis_type: AnalysisType::GeminiDeep,
            probability: prediction.probability,
            status: prediction.status,
            concerns,
            message: None,
            root_cause: Some(prediction.root_cause.clone()),
            recommended_actions: prediction.recommended_actions.clone(),
            prediction: Some(prediction),
            error: None,
            emitted,
        }
    }

    fn failed(concerns: Vec<String>, err: &AnalysisError) -> Self {
        Self {
            outcome: PredictionOutcome::AnalysisError,
            analysis_type: AnalysisType::AnalysisError,
            probability: 0.0,
            status: PredictionStatus::Unknown,
            concerns,
            message: None,
            root_cause: None,
            recommended_actions: Vec::new(),
            prediction: None,
            error: Some(err.to_string()),
            emitted: EmitReport::default(),
        }
    }
}

/// The two-tier classifier.
///
/// Reads always complete before the classification is decided, and every
/// backend write happens after it. Dropping the future before the decision
/// leaves no partial writes behind.
#[derive(Clone)]
pub struct PredictionEngine {
    quick: QuickCheck,
    reader: MetricsReader,
    model: Arc<dyn ReasoningModel>,
    emitter: AlertEmitter,
    model_timeout: Duration,
}

impl PredictionEngine {
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

    pub fn quick_check(&self) -> &QuickCheck {
        &self.quick
    }

    /// Run Tier 1, escalating to deep analysis when it flags a concern.
    /// `force` skips Tier 1 and always runs deep analysis.
    #[instrument(skip(self))]
    pub async fn predict_errors(&self, force: bool) -> ErrorPrediction {
        let concerns = if force {
            info!("forced deep analysis, skipping quick check");
            Vec::new()
        } else {
            let check = self.quick.run().await;
            if !check.needs_deep_analysis {
                info!("quick check passed, no deep analysis needed");
                let metric_emitted = self
                    .emitter
                    .emit_error_probability(HEALTHY_PROBABILITY, AnalysisType::RuleBased)
                    .await;
                self.emitter.insights_generated("error_prediction", true).await;
                return ErrorPrediction::healthy(
                    check,
                    EmitReport {
                        metric_emitted,
                        event_sent: None,
                    },
                );
            }
            info!(concerns = ?check.concerns, "running deep analysis");
            check.concerns
        };

        match self.deep_analysis().await {
            Ok(prediction) => {
                let emitted = self
                    .emitter
                    .send_error_prediction(&prediction, AnalysisType::GeminiDeep)
                    .await;
                self.emitter.insights_generated("error_prediction", true).await;
                info!(
                    probability = prediction.probability,
                    status = %prediction.status,
                    "error prediction complete"
                );
                ErrorPrediction::predicted(concerns, prediction, emitted)
            }
            Err(e) => {
                error!(error = %e, "deep analysis failed");
                self.emitter.insights_generated("error_prediction", false).await;
                ErrorPrediction::failed(concerns, &e)
            }
        }
    }

    async fn deep_analysis(&self) -> Result<PredictionResult, AnalysisError> {
        let errors = self.reader.error_metrics(ERROR_CONTEXT_WINDOW_SECS).await;
        let llm = self.reader.llm_metrics("*", LLM_CONTEXT_WINDOW_SECS).await;
        let context = prompt::format_metrics_context(&errors, &llm);

        let reply = generate_within(
            self.model.as_ref(),
            &prompt::error_prediction_prompt(&context),
            self.model_timeout,
        )
        .await?;
        prompt::parse_prediction(&reply)
    }
}
