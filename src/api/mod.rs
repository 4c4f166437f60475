//! API layer -- axum routes, handlers, and middleware.

mod routes;
pub mod state;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use self::state::AppState;
use crate::scheduler::SchedulerError;

/// Errors surfaced as non-2xx responses. Metric or analysis degradation is
/// never one of these; it is reported inside a 200 body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job {0} not found")]
    JobNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::UnknownJob(id) => ApiError::JobNotFound(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::JobNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    routes::api_routes()
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}
