//! API route definitions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::state::AppState;
use super::ApiError;
use crate::detect::PredictionOutcome;
use crate::insights::InsightOutcome;

pub const SERVICE_NAME: &str = "observability-insights-service";

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/config", get(config))
        .route("/insights/quick-check", get(quick_check))
        .route("/insights/errors", get(error_prediction))
        .route("/insights/costs", get(cost_analysis))
        .route("/insights/health", get(health_summary))
        .route("/scheduler/jobs", get(list_jobs))
        .route("/scheduler/trigger/{job_id}", post(trigger_job))
}

fn envelope<T: Serialize>(success: bool, result: T) -> Value {
    json!({
        "success": success,
        "timestamp": Utc::now().to_rfc3339(),
        "result": result,
    })
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.insights.backend_status().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "ready": true,
                "backend_connected": true,
                "timestamp": Utc::now().to_rfc3339(),
            })),
        ),
        Err(e) => {
            warn!(error = %e, auth = e.is_auth(), "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "ready": false,
                    "backend_connected": false,
                    "auth_error": e.is_auth(),
                    "reason": e.to_string(),
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
        }
    }
}

async fn config(State(state): State<AppState>) -> Json<Value> {
    let mut view = state.config.redacted();
    view["scheduler_running"] = Value::Bool(state.scheduler.is_loop_running());
    Json(view)
}

async fn quick_check(State(state): State<AppState>) -> Json<Value> {
    let result = state.insights.quick_check().await;
    let mut body = envelope(true, result);
    body["note"] = json!("This check uses no LLM tokens");
    Json(body)
}

#[derive(Debug, Deserialize)]
struct ErrorsParams {
    force: Option<String>,
}

async fn error_prediction(
    State(state): State<AppState>,
    Query(params): Query<ErrorsParams>,
) -> Json<Value> {
    let force = params
        .force
        .as_deref()
        .is_some_and(|f| f.trim().eq_ignore_ascii_case("true"));
    info!(force, "error prediction requested");

    let prediction = state.insights.predict_errors(force).await;
    let analysis_type = prediction.analysis_type;
    let skipped = prediction.outcome == PredictionOutcome::Healthy;

    let mut body = envelope(true, prediction);
    body["analysis_type"] = json!(analysis_type);
    if skipped {
        body["note"] = json!("Deep analysis skipped - no concerns detected");
    }
    Json(body)
}

fn outcome_body<T: Serialize>(outcome: InsightOutcome<T>) -> Json<Value> {
    let generated = outcome.is_generated();
    Json(envelope(generated, outcome))
}

async fn cost_analysis(State(state): State<AppState>) -> Json<Value> {
    outcome_body(state.insights.cost_analysis().await)
}

async fn health_summary(State(state): State<AppState>) -> Json<Value> {
    outcome_body(state.insights.health_summary().await)
}

async fn list_jobs(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "scheduler_running": state.scheduler.is_loop_running(),
        "jobs": state.scheduler.list(),
    }))
}

async fn trigger_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let next_run = state.scheduler.trigger_now(&job_id)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Job {} triggered", job_id),
        "next_run": next_run.to_rfc3339(),
    })))
}
