//! Metrics/alerting backend -- read and write seams plus wire types.
//!
//! Reads go through [`MetricsBackend`], writes through [`SignalSink`]. Both are
//! object-safe so the service can hold them as `Arc<dyn ..>` and tests can
//! substitute in-memory fakes.

pub mod datadog;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::datadog::DatadogClient;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend credential not configured: {0}")]
    NotConfigured(&'static str),

    #[error("backend rejected credentials: {0}")]
    Auth(String),

    #[error("backend request timed out")]
    Timeout,

    #[error("backend transport error: {0}")]
    Transport(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Credential problems make the service not-ready; everything else is
    /// treated as transient.
    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::Auth(_) | BackendError::NotConfigured(_))
    }
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

/// Response body of a time-series query.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub series: Vec<RawSeries>,
}

/// One returned series. `pointlist` entries are `[timestamp_ms, value]`, and
/// `value` may be null for empty rollup buckets.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSeries {
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub pointlist: Vec<(f64, Option<f64>)>,
}

/// Read access to the time-series store.
#[async_trait::async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Run `query` over `[from, to]` (unix seconds).
    async fn query(&self, query: &str, from: i64, to: i64) -> Result<QueryResponse, BackendError>;

    /// Check that the backend is reachable and the credentials are accepted.
    async fn validate(&self) -> Result<(), BackendError>;
}

// ---------------------------------------------------------------------------
// Write side
// ---------------------------------------------------------------------------

/// Submission type of a metric point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Gauge,
    Count,
}

impl MetricKind {
    /// Numeric intake type (`1` gauge, `0` count).
    pub fn intake_code(self) -> u8 {
        match self {
            MetricKind::Gauge => 1,
            MetricKind::Count => 0,
        }
    }
}

/// A single metric point with its tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSubmission {
    pub metric: String,
    pub kind: MetricKind,
    pub timestamp: i64,
    pub value: f64,
    pub tags: Vec<String>,
}

/// Priority of an event in the backend's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Normal,
    Low,
}

/// A human-readable event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSubmission {
    pub title: String,
    pub text: String,
    /// `error`, `warning`, `info` or `success`.
    pub alert_type: String,
    pub priority: EventPriority,
    pub tags: Vec<String>,
    pub date_happened: i64,
    pub aggregation_key: Option<String>,
}

/// Write access to the metrics/alerting backend.
#[async_trait::async_trait]
pub trait SignalSink: Send + Sync {
    async fn submit_metric(&self, metric: &MetricSubmission) -> Result<(), BackendError>;

    async fn post_event(&self, event: &EventSubmission) -> Result<(), BackendError>;
}
