//! Outbound signals: metrics and human-readable events.
//!
//! Every write is best-effort. Failures are logged and reported as `false`;
//! they never change the classification a caller returns.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{EventPriority, EventSubmission, MetricKind, MetricSubmission, SignalSink};
use crate::detect::{AnalysisType, PredictionResult, Severity};
use crate::insights::{CostReport, HealthSummary};

pub const ERROR_PROBABILITY_METRIC: &str = "llm.prediction.error_probability";
pub const INSIGHTS_GENERATED_METRIC: &str = "llm.insights.generated";
pub const COST_FORECAST_METRIC: &str = "llm.prediction.cost_forecast_24h";
pub const POTENTIAL_SAVINGS_METRIC: &str = "llm.optimization.potential_savings";
pub const PROJECTED_MONTHLY_METRIC: &str = "llm.cost.projected_monthly";

/// Hours until issue assumed when the model gives no estimate.
pub const DEFAULT_TIME_TO_ISSUE_HOURS: f64 = 2.0;

/// What reached the backend for one prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmitReport {
    pub metric_emitted: bool,
    /// `None` when no event was due (probability below 0.5).
    pub event_sent: Option<bool>,
}

#[derive(Clone)]
pub struct AlertEmitter {
    sink: Arc<dyn SignalSink>,
    default_tags: Vec<String>,
}

impl AlertEmitter {
    pub fn new(sink: Arc<dyn SignalSink>, env: &str) -> Self {
        Self {
            sink,
            default_tags: vec![
                "service:observability-insights-service".to_string(),
                format!("env:{}", env),
                "source:ai-insights".to_string(),
            ],
        }
    }

    pub fn default_tags(&self) -> &[String] {
        &self.default_tags
    }

    fn tags(&self, extra: &[String]) -> Vec<String> {
        let mut all = self.default_tags.clone();
        all.extend_from_slice(extra);
        all
    }

    /// Submit one gauge point.
    pub async fn emit_metric(&self, name: &str, value: f64, tags: &[String]) -> bool {
        self.submit(name, MetricKind::Gauge, value, tags).await
    }

    /// Submit one count point.
    pub async fn emit_count(&self, name: &str, value: f64, tags: &[String]) -> bool {
        self.submit(name, MetricKind::Count, value, tags).await
    }

    async fn submit(&self, name: &str, kind: MetricKind, value: f64, tags: &[String]) -> bool {
        let metric = MetricSubmission {
            metric: name.to_string(),
            kind,
            timestamp: Utc::now().timestamp(),
            value,
            tags: self.tags(tags),
        };
        match self.sink.submit_metric(&metric).await {
            Ok(()) => {
                debug!(metric = %name, value, "metric emitted");
                true
            }
            Err(e) => {
                warn!(metric = %name, error = %e, "metric emission failed");
                false
            }
        }
    }

    /// Post one event.
    pub async fn send_event(
        &self,
        title: &str,
        text: &str,
        alert_type: &str,
        priority: EventPriority,
        tags: &[String],
        aggregation_key: Option<&str>,
    ) -> bool {
        let event = EventSubmission {
            title: title.to_string(),
            text: text.to_string(),
            alert_type: alert_type.to_string(),
            priority,
            tags: self.tags(tags),
            date_happened: Utc::now().timestamp(),
            aggregation_key: aggregation_key.map(str::to_string),
        };
        match self.sink.post_event(&event).await {
            Ok(()) => {
                info!(title = %title, alert_type, "event sent");
                true
            }
            Err(e) => {
                warn!(title = %title, error = %e, "event send failed");
                false
            }
        }
    }

    /// The error-probability gauge, tagged with the path that produced it.
    pub async fn emit_error_probability(&self, probability: f64, analysis: AnalysisType) -> bool {
        let tags = [
            "prediction_type:error".to_string(),
            format!("analysis_type:{}", analysis.as_str()),
        ];
        self.emit_metric(ERROR_PROBABILITY_METRIC, probability, &tags).await
    }

    /// Emit the probability metric and, from 0.5 up, a prediction event.
    pub async fn send_error_prediction(
        &self,
        prediction: &PredictionResult,
        analysis: AnalysisType,
    ) -> EmitReport {
        let p = prediction.probability;
        let metric_emitted = self.emit_error_probability(p, analysis).await;

        let Some(severity) = Severity::for_probability(p) else {
            info!(probability = p, "error probability low, not sending alert event");
            return EmitReport {
                metric_emitted,
                event_sent: None,
            };
        };

        let title = format!("Predicted Service Degradation ({:.0}% confidence)", p * 100.0);
        let text = prediction_event_text(prediction);
        let tags = [
            "prediction:error".to_string(),
            format!("confidence:{:.2}", p),
        ];
        let sent = self
            .send_event(
                &title,
                &text,
                severity.alert_type(),
                EventPriority::Normal,
                &tags,
                Some("error_prediction"),
            )
            .await;

        EmitReport {
            metric_emitted,
            event_sent: Some(sent),
        }
    }

    /// Cost gauges plus a low-priority report event.
    pub async fn send_cost_report(&self, report: &CostReport) -> bool {
        self.emit_metric(COST_FORECAST_METRIC, report.daily_cost, &[]).await;
        self.emit_metric(POTENTIAL_SAVINGS_METRIC, report.potential_savings_monthly, &[])
            .await;
        self.emit_metric(PROJECTED_MONTHLY_METRIC, report.monthly_projected, &[])
            .await;

        let mut recs = String::new();
        for (i, rec) in report.recommendations.iter().enumerate() {
            recs.push_str(&format!(
                "\n### {}. {}\n{}\n**Estimated Monthly Savings:** ${:.2}\n",
                i + 1,
                rec.title,
                rec.description,
                rec.estimated_savings
            ));
        }

        let pct = report.potential_savings_monthly / report.monthly_projected.max(0.01) * 100.0;
        let text = format!(
            "## Daily Cost Analysis\n\n\
             | Metric | Value |\n\
             |--------|-------|\n\
             | Current Daily Cost | ${:.2} |\n\
             | Projected Monthly Cost | ${:.2} |\n\
             | Potential Monthly Savings | ${:.2} ({:.1}%) |\n\n\
             ## Optimization Recommendations\n{}\n---\n\
             *Generated by the Observability Insights Service from token usage patterns.*\n",
            report.daily_cost,
            report.monthly_projected,
            report.potential_savings_monthly,
            pct,
            recs
        );

        self.send_event(
            "LLM Cost Optimization Report",
            &text,
            "info",
            EventPriority::Low,
            &["report:cost_optimization".to_string()],
            Some("cost_report"),
        )
        .await
    }

    /// Health summary event; alert type follows the reported status.
    pub async fn send_health_summary(&self, summary: &HealthSummary) -> bool {
        let status = summary.overall_status.as_str();
        let alert_type = match status {
            "healthy" => "success",
            "warning" => "warning",
            "critical" => "error",
            _ => "info",
        };
        let priority = if status == "healthy" {
            EventPriority::Low
        } else {
            EventPriority::Normal
        };

        let text = format!(
            "## AI-Generated Health Summary\n\n{}\n\n\
             ### Highlights\n{}\n\n\
             ### Concerns\n{}\n\n\
             ### Recommendations\n{}\n\n---\n\
             *Generated at {} by the Observability Insights Service*\n",
            summary.summary,
            bullets(&summary.highlights, "No significant highlights"),
            bullets(&summary.concerns, "No current concerns"),
            bullets(&summary.recommendations, "Continue monitoring"),
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
        );

        self.send_event(
            &format!("System Health Summary - {}", status.to_uppercase()),
            &text,
            alert_type,
            priority,
            &[format!("health:{}", status)],
            Some("health_summary"),
        )
        .await
    }

    /// Self-monitoring count for one generated insight.
    pub async fn insights_generated(&self, insight_type: &str, success: bool) -> bool {
        let tags = [
            format!("insight_type:{}", insight_type),
            format!("success:{}", success),
        ];
        let value = if success { 1.0 } else { 0.0 };
        self.emit_count(INSIGHTS_GENERATED_METRIC, value, &tags).await
    }
}

fn bullets(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("- {}", empty);
    }
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn prediction_event_text(p: &PredictionResult) -> String {
    let services = if p.affected_services.is_empty() {
        "All LLM services".to_string()
    } else {
        p.affected_services.join(", ")
    };
    let actions = p
        .recommended_actions
        .iter()
        .map(|a| format!("- {}", a))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "## AI-Powered Prediction Alert\n\n\
         **Probability:** {:.1}%\n\
         **Estimated Time to Issue:** {:.1} hours\n\
         **Affected Services:** {}\n\n\
         ### Root Cause Analysis\n{}\n\n\
         ### Recommended Actions\n{}\n\n\
         {}\n",
        p.probability * 100.0,
        p.time_to_issue_hours.unwrap_or(DEFAULT_TIME_TO_ISSUE_HOURS),
        services,
        p.root_cause,
        actions,
        p.report_markdown,
    )
}
