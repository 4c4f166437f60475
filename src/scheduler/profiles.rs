//! The recurring insight jobs registered at startup.

use std::sync::Arc;

use futures::FutureExt;

use super::{JobFn, Scheduler, SchedulerError};
use crate::config::ScheduleConfig;
use crate::detect::PredictionOutcome;
use crate::insights::{InsightOutcome, InsightsService};

pub const ERROR_PREDICTION_JOB: &str = "error_prediction";
pub const COST_ANALYSIS_JOB: &str = "cost_analysis";
pub const HEALTH_SUMMARY_JOB: &str = "health_summary";

fn error_prediction(insights: InsightsService) -> JobFn {
    Arc::new(move || {
        let insights = insights.clone();
        async move {
            let p = insights.predict_errors(false).await;
            match p.outcome {
                PredictionOutcome::AnalysisError => Err(anyhow::anyhow!(
                    "deep analysis failed: {}",
                    p.error.unwrap_or_default()
                )),
                _ => Ok(format!(
                    "status={} probability={:.2} analysis_type={}",
                    p.status,
                    p.probability,
                    p.analysis_type.as_str()
                )),
            }
        }
        .boxed()
    })
}

fn cost_analysis(insights: InsightsService) -> JobFn {
    Arc::new(move || {
        let insights = insights.clone();
        async move {
            match insights.cost_analysis().await {
                InsightOutcome::Generated { result, .. } => Ok(format!(
                    "daily_cost={:.2} potential_savings_monthly={:.2}",
                    result.daily_cost, result.potential_savings_monthly
                )),
                InsightOutcome::Failed { error } => Err(anyhow::anyhow!(error)),
            }
        }
        .boxed()
    })
}

fn health_summary(insights: InsightsService) -> JobFn {
    Arc::new(move || {
        let insights = insights.clone();
        async move {
            match insights.health_summary().await {
                InsightOutcome::Generated { result, .. } => {
                    Ok(format!("overall_status={}", result.overall_status))
                }
                InsightOutcome::Failed { error } => Err(anyhow::anyhow!(error)),
            }
        }
        .boxed()
    })
}

/// Register the three default jobs with intervals from `schedule`.
pub fn register_defaults(
    scheduler: &Scheduler,
    insights: &InsightsService,
    schedule: &ScheduleConfig,
) -> Result<(), SchedulerError> {
    scheduler.register(
        ERROR_PREDICTION_JOB,
        "Error Prediction",
        schedule.error_prediction_interval(),
        error_prediction(insights.clone()),
    )?;
    scheduler.register(
        COST_ANALYSIS_JOB,
        "Cost Analysis",
        schedule.cost_analysis_interval(),
        cost_analysis(insights.clone()),
    )?;
    scheduler.register(
        HEALTH_SUMMARY_JOB,
        "Health Summary",
        schedule.health_summary_interval(),
        health_summary(insights.clone()),
    )?;
    Ok(())
}
