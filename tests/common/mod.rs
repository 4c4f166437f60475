//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use boutique_insights::backend::{
    BackendError, EventSubmission, MetricSubmission, MetricsBackend, QueryResponse, RawSeries,
    SignalSink,
};
use boutique_insights::config::InsightsConfig;
use boutique_insights::detect::model::ReasoningModel;
use boutique_insights::detect::AnalysisError;
use boutique_insights::insights::InsightsService;

pub const ERROR_RATE_QUERY: &str = "avg:llm.error.rate{*}";
pub const LATENCY_QUERY: &str = "avg:llm.request.duration{*}";
pub const HALLUCINATION_QUERY: &str = "avg:llm.recommendation.invalid_product_rate{*}";

/// Metrics backend answering from a query-string table. Unknown queries
/// return an empty response.
#[derive(Default)]
pub struct FakeBackend {
    series: Mutex<HashMap<String, Vec<f64>>>,
    auth_failure: Mutex<bool>,
    /// `(query, window_secs)` for every query issued.
    queries: Mutex<Vec<(String, i64)>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, query: &str, values: &[f64]) {
        self.series
            .lock()
            .unwrap()
            .insert(query.to_string(), values.to_vec());
    }

    pub fn reject_credentials(&self) {
        *self.auth_failure.lock().unwrap() = true;
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries_issued(&self) -> Vec<(String, i64)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MetricsBackend for FakeBackend {
    async fn query(&self, query: &str, from: i64, to: i64) -> Result<QueryResponse, BackendError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), to - from));
        let series = self.series.lock().unwrap();
        let Some(values) = series.get(query) else {
            return Ok(QueryResponse::default());
        };
        let pointlist = values
            .iter()
            .enumerate()
            .map(|(i, v)| (((from + i as i64 * 60) * 1000) as f64, Some(*v)))
            .collect();
        Ok(QueryResponse {
            series: vec![RawSeries {
                metric: Some(query.to_string()),
                pointlist,
            }],
        })
    }

    async fn validate(&self) -> Result<(), BackendError> {
        if *self.auth_failure.lock().unwrap() {
            Err(BackendError::Auth("status 403".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Sink that records every write.
#[derive(Default)]
pub struct RecordingSink {
    pub metrics: Mutex<Vec<MetricSubmission>>,
    pub events: Mutex<Vec<EventSubmission>>,
    fail: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn metrics_named(&self, name: &str) -> Vec<MetricSubmission> {
        self.metrics
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.metric == name)
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Vec<EventSubmission> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SignalSink for RecordingSink {
    async fn submit_metric(&self, metric: &MetricSubmission) -> Result<(), BackendError> {
        if *self.fail.lock().unwrap() {
            return Err(BackendError::Transport("connection refused".to_string()));
        }
        self.metrics.lock().unwrap().push(metric.clone());
        Ok(())
    }

    async fn post_event(&self, event: &EventSubmission) -> Result<(), BackendError> {
        if *self.fail.lock().unwrap() {
            return Err(BackendError::Transport("connection refused".to_string()));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Model that replays scripted replies and counts calls. Once the script is
/// exhausted it repeats the fallback reply.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, AnalysisError>>>,
    fallback: String,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(error: AnalysisError) -> Arc<Self> {
        let model = Self::replying("");
        model.replies.lock().unwrap().push_back(Err(error));
        model
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReasoningModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Ok(self.fallback.clone()),
        }
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub sink: Arc<RecordingSink>,
    pub model: Arc<ScriptedModel>,
    pub service: InsightsService,
}

pub fn harness(model: Arc<ScriptedModel>) -> Harness {
    let backend = FakeBackend::new();
    let sink = RecordingSink::new();
    let service = InsightsService::new(
        backend.clone(),
        sink.clone(),
        model.clone(),
        &InsightsConfig::default(),
    );
    Harness {
        backend,
        sink,
        model,
        service,
    }
}

pub const HIGH_RISK_REPLY: &str = r#"Here is my analysis:
```json
{
  "probability": 0.85,
  "confidence": 0.7,
  "status": "critical",
  "failure_predictions": [
    {"service": "chatbotservice", "failure_mode": "timeout cascade", "probability": 0.85,
     "root_cause": "p99 latency climbing"}
  ],
  "affected_services": ["chatbotservice"],
  "time_to_issue_hours": 1.5,
  "recommended_actions": ["Scale chatbotservice", "Add request timeouts"]
}
```"#;

pub const LOW_RISK_REPLY: &str =
    r#"{"probability": 0.2, "confidence": 0.9, "recommended_actions": ["Keep monitoring"]}"#;
