use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::InsightOutcome;
use crate::alert::AlertEmitter;
use crate::detect::model::{generate_within, ReasoningModel};
use crate::detect::prompt;
use crate::detect::AnalysisError;
use crate::metrics::{MetricsReader, TokenUsage};

/// Usage window for cost analysis (seconds).
pub const COST_WINDOW_SECS: u64 = 86_400;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostRecommendation {
    pub title: String,
    pub description: String,
    pub estimated_savings: f64,
    pub effort: Option<String>,
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    pub daily_cost: f64,
    pub monthly_projected: f64,
    pub potential_savings_monthly: f64,
    pub savings_percentage: f64,
    pub analysis: String,
    pub recommendations: Vec<CostRecommendation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCostReport {
    daily_cost: Option<f64>,
    monthly_projected: Option<f64>,
    potential_savings_monthly: Option<f64>,
    savings_percentage: Option<f64>,
    analysis: String,
    recommendations: Vec<CostRecommendation>,
}

impl CostReport {
    /// Fill gaps in the model's reply from measured usage.
    fn from_reply(raw: RawCostReport, usage: &TokenUsage) -> Self {
        let daily_cost = raw.daily_cost.unwrap_or(usage.cost_usd_total);
        let monthly_projected = raw.monthly_projected.unwrap_or(daily_cost * 30.0);
        let potential_savings_monthly = raw.potential_savings_monthly.unwrap_or(0.0).max(0.0);
        let savings_percentage = raw.savings_percentage.unwrap_or_else(|| {
            potential_savings_monthly / monthly_projected.max(0.01) * 100.0
        });
        Self {
            daily_cost,
            monthly_projected,
            potential_savings_monthly,
            savings_percentage,
            analysis: raw.analysis,
            recommendations: raw.recommendations,
        }
    }
}

/// Token usage → model → cost report event.
#[derive(Clone)]
pub struct CostAnalyzer {
    reader: MetricsReader,
    model: Arc<dyn ReasoningModel>,
    emitter: AlertEmitter,
    model_timeout: Duration,
}

impl CostAnalyzer {
    pub fn new(
        reader: MetricsReader,
        model: Arc<dyn ReasoningModel>,
        emitter: AlertEmitter,
        model_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            model,
            emitter,
            model_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn analyze(&self) -> InsightOutcome<CostReport> {
        let usage = self.reader.token_usage(COST_WINDOW_SECS).await;

        match self.generate(&usage).await {
            Ok(report) => {
                let event_sent = self.emitter.send_cost_report(&report).await;
                self.emitter.insights_generated("cost_optimization", true).await;
                info!(
                    daily_cost = report.daily_cost,
                    potential_savings = report.potential_savings_monthly,
                    "cost analysis complete"
                );
                InsightOutcome::Generated {
                    result: report,
                    event_sent,
                }
            }
            Err(e) => {
                error!(error = %e, "cost analysis failed");
                self.emitter.insights_generated("cost_optimization", false).await;
                InsightOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn generate(&self, usage: &TokenUsage) -> Result<CostReport, AnalysisError> {
        let reply = generate_within(
            self.model.as_ref(),
            &prompt::cost_prompt(usage),
            self.model_timeout,
        )
        .await?;
        let raw: RawCostReport = serde_json::from_value(prompt::extract_json(&reply)?)
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;
        Ok(CostReport::from_reply(raw, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(cost: f64) -> TokenUsage {
        TokenUsage {
            cost_usd_total: cost,
            ..Default::default()
        }
    }

    #[test]
    fn test_gaps_filled_from_usage() {
        let report = CostReport::from_reply(RawCostReport::default(), &usage(2.0));
        assert_eq!(report.daily_cost, 2.0);
        assert_eq!(report.monthly_projected, 60.0);
        assert_eq!(report.potential_savings_monthly, 0.0);
        assert_eq!(report.savings_percentage, 0.0);
    }

    #[test]
    fn test_model_values_win() {
        let raw: RawCostReport = serde_json::from_str(
            r#"{"daily_cost": 5, "monthly_projected": 150, "potential_savings_monthly": 30,
                "recommendations": [{"title": "Cache", "estimated_savings": 20}]}"#,
        )
        .unwrap();
        let report = CostReport::from_reply(raw, &usage(1.0));
        assert_eq!(report.daily_cost, 5.0);
        assert_eq!(report.savings_percentage, 20.0);
        assert_eq!(report.recommendations[0].title, "Cache");
        assert_eq!(report.recommendations[0].effort, None);
    }
}
