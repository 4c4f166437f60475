//! Two-tier health classification: a free threshold check gating an
//! expensive deep analysis by a reasoning model.

pub mod engine;
pub mod model;
pub mod prompt;
pub mod quick;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::engine::{ErrorPrediction, PredictionEngine, PredictionOutcome};
pub use self::model::{GeminiClient, ReasoningModel, UnconfiguredModel};
pub use self::quick::QuickCheck;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("reasoning model not configured: {0}")]
    NotConfigured(String),

    #[error("reasoning model call failed: {0}")]
    Model(String),

    #[error("reasoning model timed out after {0}s")]
    Timeout(u64),

    #[error("could not parse model output: {0}")]
    Parse(String),
}

/// Tier 1 breach thresholds. A value strictly above its threshold is a breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Fraction of failed LLM requests.
    pub error_rate: f64,
    /// Average LLM request duration (seconds).
    pub latency_secs: f64,
    /// Fraction of recommended products missing from the catalog.
    pub hallucination_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            error_rate: 0.02,
            latency_secs: 3.0,
            hallucination_rate: 0.02,
        }
    }
}

impl Thresholds {
    /// Evaluate the latest readings. Absent readings are neither recorded nor
    /// counted as breaches.
    pub fn evaluate(
        &self,
        error_rate: Option<f64>,
        latency_avg: Option<f64>,
        hallucination_rate: Option<f64>,
    ) -> HealthCheckResult {
        let mut result = HealthCheckResult::default();

        if let Some(v) = error_rate {
            result.metrics.insert("error_rate".to_string(), v);
            if v > self.error_rate {
                result
                    .concerns
                    .push(format!("Error rate elevated: {:.2}%", v * 100.0));
            }
        }
        if let Some(v) = latency_avg {
            result.metrics.insert("latency_avg".to_string(), v);
            if v > self.latency_secs {
                result.concerns.push(format!("Latency elevated: {:.2}s", v));
            }
        }
        if let Some(v) = hallucination_rate {
            result.metrics.insert("hallucination_rate".to_string(), v);
            if v > self.hallucination_rate {
                result
                    .concerns
                    .push(format!("Hallucination rate elevated: {:.2}%", v * 100.0));
            }
        }

        result.needs_deep_analysis = !result.concerns.is_empty();
        result
    }
}

/// Outcome of a Tier 1 check. Built fresh on every invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub needs_deep_analysis: bool,
    pub concerns: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
}

/// Display severity of an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Event severity for a prediction probability; `None` below 0.5.
    pub fn for_probability(p: f64) -> Option<Self> {
        if p >= 0.8 {
            Some(Severity::Critical)
        } else if p >= 0.6 {
            Some(Severity::Warning)
        } else if p >= 0.5 {
            Some(Severity::Info)
        } else {
            None
        }
    }

    /// Backend `alert_type` string.
    pub fn alert_type(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

impl PredictionStatus {
    pub fn from_probability(p: f64) -> Self {
        if p >= 0.8 {
            PredictionStatus::Critical
        } else if p >= 0.5 {
            PredictionStatus::Warning
        } else {
            PredictionStatus::Healthy
        }
    }

    /// Parse a model-supplied status. `unknown` is reserved for failures and
    /// is never accepted from the model.
    pub fn parse_reported(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "healthy" => Some(PredictionStatus::Healthy),
            "warning" => Some(PredictionStatus::Warning),
            "critical" => Some(PredictionStatus::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PredictionStatus::Healthy => "healthy",
            PredictionStatus::Warning => "warning",
            PredictionStatus::Critical => "critical",
            PredictionStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path produced a prediction; used as the `analysis_type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    RuleBased,
    GeminiDeep,
    AnalysisError,
}

impl AnalysisType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisType::RuleBased => "rule_based",
            AnalysisType::GeminiDeep => "gemini_deep",
            AnalysisType::AnalysisError => "analysis_error",
        }
    }
}

/// Per-service failure forecast from deep analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePrediction {
    pub service: Option<String>,
    pub failure_mode: Option<String>,
    pub probability: f64,
    pub time_to_failure_minutes: Option<f64>,
    pub user_impact: Option<String>,
    pub symptoms: Vec<String>,
    pub root_cause: Option<String>,
    pub mitigation: Option<String>,
}

/// Structured deep-analysis result. `probability` and `confidence` are
/// always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probability: f64,
    pub confidence: Option<f64>,
    pub status: PredictionStatus,
    pub root_cause: String,
    pub affected_services: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub time_to_issue_hours: Option<f64>,
    pub failure_predictions: Vec<FailurePrediction>,
    /// Markdown report attached to the outbound event.
    pub report_markdown: String,
}
