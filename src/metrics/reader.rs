use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Aggregator, MetricPoint, MetricQuery, MetricSeries, MetricSummary, MetricsError};
use crate::backend::MetricsBackend;

/// Model pricing used for cost estimates, USD per million tokens.
pub const INPUT_PRICE_PER_M: f64 = 0.075;
pub const OUTPUT_PRICE_PER_M: f64 = 0.30;

/// Token usage totals for the LLM services over a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenUsage {
    pub window_secs: u64,
    pub output_tokens: f64,
    pub input_cost_usd: f64,
    pub estimated_input_tokens: u64,
    pub total_tokens_estimated: u64,
    pub span_count: f64,
    pub cost_usd_total: f64,
}

impl TokenUsage {
    fn from_totals(window_secs: u64, output_tokens: f64, input_cost_usd: f64, span_count: f64) -> Self {
        let estimated_input_tokens = if input_cost_usd > 0.0 {
            ((input_cost_usd / INPUT_PRICE_PER_M) * 1_000_000.0) as u64
        } else {
            0
        };
        let output_cost = (output_tokens / 1_000_000.0) * OUTPUT_PRICE_PER_M;
        Self {
            window_secs,
            output_tokens,
            input_cost_usd,
            estimated_input_tokens,
            total_tokens_estimated: estimated_input_tokens + output_tokens.max(0.0) as u64,
            span_count,
            cost_usd_total: input_cost_usd + output_cost,
        }
    }
}

struct BundleEntry {
    key: &'static str,
    metric: &'static str,
    aggregator: Aggregator,
    service: Option<&'static str>,
    as_count: bool,
}

const ERROR_BUNDLE: &[BundleEntry] = &[
    BundleEntry {
        key: "chatbot_errors",
        metric: "trace.flask.request.errors",
        aggregator: Aggregator::Sum,
        service: Some("chatbotservice"),
        as_count: true,
    },
    BundleEntry {
        key: "chatbot_latency_p99",
        metric: "trace.flask.request",
        aggregator: Aggregator::P99,
        service: Some("chatbotservice"),
        as_count: false,
    },
    BundleEntry {
        key: "shopping_assistant_errors",
        metric: "trace.flask.request.errors",
        aggregator: Aggregator::Sum,
        service: Some("shoppingassistantservice"),
        as_count: true,
    },
    BundleEntry {
        key: "peau_agent_errors",
        metric: "trace.flask.request.errors",
        aggregator: Aggregator::Sum,
        service: Some("peau_agent"),
        as_count: true,
    },
    BundleEntry {
        key: "llm_error_rate",
        metric: "llm.error.rate",
        aggregator: Aggregator::Avg,
        service: None,
        as_count: false,
    },
    BundleEntry {
        key: "llm_latency",
        metric: "llm.request.duration",
        aggregator: Aggregator::Avg,
        service: None,
        as_count: false,
    },
];

/// LLM bundle entries; the service filter comes from the caller.
const LLM_BUNDLE: &[(&str, &str, Aggregator, bool)] = &[
    ("request_duration", "llm.request.duration", Aggregator::Avg, false),
    ("tokens_input", "llm.tokens.input", Aggregator::Sum, true),
    ("tokens_output", "llm.tokens.output", Aggregator::Sum, true),
    ("total_cost", "llm.tokens.total_cost_usd", Aggregator::Sum, false),
    ("quality_score", "llm.response.quality_score", Aggregator::Avg, false),
    ("invalid_product_rate", "llm.recommendation.invalid_product_rate", Aggregator::Avg, false),
    ("error_rate", "llm.error.rate", Aggregator::Avg, false),
];

/// Translates metric queries into summaries.
///
/// Every read failure (transport, auth, empty result) collapses to `None`:
/// short-lived services often have no traffic, and callers skip the metric
/// rather than fail.
#[derive(Clone)]
pub struct MetricsReader {
    backend: Arc<dyn MetricsBackend>,
}

impl MetricsReader {
    pub fn new(backend: Arc<dyn MetricsBackend>) -> Self {
        Self { backend }
    }

    /// Fetch the first series matching `query` over `[now - window, now]`.
    pub async fn query_series(&self, query: &MetricQuery) -> Option<MetricSeries> {
        let to = Utc::now().timestamp();
        let from = to - query.window() as i64;
        let query_string = query.to_query_string();

        let response = match self.backend.query(&query_string, from, to).await {
            Ok(r) => r,
            Err(e) => {
                warn!(query = %query_string, error = %e, "metric read failed, treating as unavailable");
                return None;
            }
        };

        let Some(raw) = response.series.into_iter().next() else {
            debug!(query = %query_string, "query returned no series");
            return None;
        };

        let points = raw
            .pointlist
            .into_iter()
            .filter_map(|(ts, value)| {
                value.map(|v| MetricPoint {
                    timestamp: ts as i64,
                    value: v,
                })
            })
            .collect();

        Some(MetricSeries {
            name: query.metric().to_string(),
            points,
        })
    }

    /// Summary of the first matching series, or `None` when unavailable.
    pub async fn query(&self, query: &MetricQuery) -> Option<MetricSummary> {
        self.query_series(query).await.map(|s| s.summarize())
    }

    /// Sum of all points in the first matching series; `0` when unavailable.
    pub async fn total(&self, query: &MetricQuery) -> f64 {
        self.query_series(query)
            .await
            .map(|s| s.points.iter().map(|p| p.value).sum())
            .unwrap_or(0.0)
    }

    /// Error counters and latencies for the prediction context. Every key is
    /// present; unavailable metrics read as zero.
    pub async fn error_metrics(&self, window_secs: u64) -> BTreeMap<String, MetricSummary> {
        let mut out = BTreeMap::new();
        for entry in ERROR_BUNDLE {
            let summary = match build_query(entry.metric, entry.aggregator, entry.service, entry.as_count, window_secs) {
                Ok(q) => self.query(&q).await,
                Err(e) => {
                    warn!(key = entry.key, error = %e, "skipping malformed bundle query");
                    None
                }
            };
            out.insert(
                entry.key.to_string(),
                summary.unwrap_or_else(MetricSummary::zero),
            );
        }
        out
    }

    /// LLM request metrics for one service (`"*"` for all). Unavailable
    /// metrics are kept as `None` so prompts can print `N/A`.
    pub async fn llm_metrics(
        &self,
        service: &str,
        window_secs: u64,
    ) -> BTreeMap<String, Option<MetricSummary>> {
        let service = (service != "*").then_some(service);
        let mut out = BTreeMap::new();
        for (key, metric, aggregator, as_count) in LLM_BUNDLE {
            let summary = match build_query(metric, *aggregator, service, *as_count, window_secs) {
                Ok(q) => self.query(&q).await,
                Err(e) => {
                    warn!(key, error = %e, "skipping malformed bundle query");
                    None
                }
            };
            out.insert(key.to_string(), summary);
        }
        debug!(service = service.unwrap_or("*"), keys = out.len(), "fetched LLM metrics");
        out
    }

    /// Token and cost totals from the LLM observability span metrics.
    pub async fn token_usage(&self, window_secs: u64) -> TokenUsage {
        let mut totals = [0.0; 3];
        let specs = [
            ("ml_obs.span.llm.completion.tokens", false),
            ("ml_obs.span.llm.input.cost", false),
            ("ml_obs.span", true),
        ];
        for (slot, (metric, as_count)) in totals.iter_mut().zip(specs) {
            match build_query(metric, Aggregator::Sum, None, as_count, window_secs) {
                Ok(q) => *slot = self.total(&q).await,
                Err(e) => warn!(metric, error = %e, "skipping malformed usage query"),
            }
        }
        TokenUsage::from_totals(window_secs, totals[0], totals[1], totals[2])
    }
}

fn build_query(
    metric: &str,
    aggregator: Aggregator,
    service: Option<&str>,
    as_count: bool,
    window_secs: u64,
) -> Result<MetricQuery, MetricsError> {
    let mut q = MetricQuery::new(metric)?
        .aggregator(aggregator)
        .service(service.unwrap_or("*"))
        .window_secs(window_secs)?;
    if as_count {
        q = q.as_count();
    }
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, QueryResponse, RawSeries};
    use crate::metrics::Trend;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers by exact query string; records every query seen.
    #[derive(Default)]
    struct FakeBackend {
        answers: HashMap<String, Vec<(f64, Option<f64>)>>,
        fail: bool,
        seen: Mutex<Vec<(String, i64, i64)>>,
    }

    #[async_trait::async_trait]
    impl MetricsBackend for FakeBackend {
        async fn query(&self, query: &str, from: i64, to: i64) -> Result<QueryResponse, BackendError> {
            self.seen.lock().unwrap().push((query.to_string(), from, to));
            if self.fail {
                return Err(BackendError::Transport("connection refused".into()));
            }
            Ok(QueryResponse {
                series: self
                    .answers
                    .get(query)
                    .map(|points| {
                        vec![RawSeries {
                            metric: None,
                            pointlist: points.clone(),
                        }]
                    })
                    .unwrap_or_default(),
            })
        }

        async fn validate(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn reader(backend: FakeBackend) -> (MetricsReader, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        (MetricsReader::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_query_summarizes_and_drops_nulls() {
        let mut fake = FakeBackend::default();
        fake.answers.insert(
            "avg:llm.error.rate{*}".into(),
            vec![(1000.0, Some(0.01)), (2000.0, None), (3000.0, Some(0.03))],
        );
        let (reader, backend) = reader(fake);

        let q = MetricQuery::new("llm.error.rate").unwrap().window_secs(900).unwrap();
        let summary = reader.query(&q).await.unwrap();

        assert_eq!(summary.points, 2);
        assert_eq!(summary.latest, Some(0.03));
        assert!((summary.average - 0.02).abs() < 1e-12);
        assert_eq!(summary.trend, Trend::Increasing);

        let seen = backend.seen.lock().unwrap();
        let (_, from, to) = seen[0];
        assert_eq!(to - from, 900);
    }

    #[tokio::test]
    async fn test_no_series_is_unavailable() {
        let (reader, _) = reader(FakeBackend::default());
        let q = MetricQuery::new("llm.error.rate").unwrap();
        assert!(reader.query(&q).await.is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_is_unavailable() {
        let (reader, _) = reader(FakeBackend {
            fail: true,
            ..Default::default()
        });
        let q = MetricQuery::new("llm.error.rate").unwrap();
        assert!(reader.query(&q).await.is_none());
        assert_eq!(reader.total(&q).await, 0.0);
    }

    #[tokio::test]
    async fn test_error_bundle_fills_missing_with_zero() {
        let mut fake = FakeBackend::default();
        fake.answers.insert(
            "sum:trace.flask.request.errors{service:chatbotservice}.as_count()".into(),
            vec![(1.0, Some(2.0)), (2.0, Some(6.0))],
        );
        let (reader, backend) = reader(fake);

        let bundle = reader.error_metrics(3600).await;

        assert_eq!(bundle.len(), 6);
        assert_eq!(bundle["chatbot_errors"].latest, Some(6.0));
        assert_eq!(bundle["chatbot_errors"].max, 6.0);
        assert_eq!(bundle["llm_latency"], MetricSummary::zero());
        assert!(backend
            .seen
            .lock()
            .unwrap()
            .iter()
            .any(|(q, _, _)| q == "p99:trace.flask.request{service:chatbotservice}"));
    }

    #[tokio::test]
    async fn test_llm_bundle_respects_service_filter() {
        let (reader, backend) = reader(FakeBackend::default());
        let bundle = reader.llm_metrics("chatbotservice", 86_400).await;

        assert_eq!(bundle.len(), 7);
        assert!(bundle.values().all(|v| v.is_none()));
        let seen = backend.seen.lock().unwrap();
        assert!(seen
            .iter()
            .any(|(q, _, _)| q == "sum:llm.tokens.input{service:chatbotservice}.as_count()"));
        assert!(seen.iter().all(|(_, from, to)| to - from == 86_400));
    }

    #[tokio::test]
    async fn test_token_usage_estimates() {
        let mut fake = FakeBackend::default();
        fake.answers.insert(
            "sum:ml_obs.span.llm.completion.tokens{*}".into(),
            vec![(1.0, Some(600_000.0)), (2.0, Some(400_000.0))],
        );
        fake.answers
            .insert("sum:ml_obs.span.llm.input.cost{*}".into(), vec![(1.0, Some(0.15))]);
        fake.answers
            .insert("sum:ml_obs.span{*}.as_count()".into(), vec![(1.0, Some(42.0))]);
        let (reader, _) = reader(fake);

        let usage = reader.token_usage(86_400).await;

        assert_eq!(usage.output_tokens, 1_000_000.0);
        assert_eq!(usage.estimated_input_tokens, 2_000_000);
        assert_eq!(usage.total_tokens_estimated, 3_000_000);
        assert_eq!(usage.span_count, 42.0);
        assert!((usage.cost_usd_total - 0.45).abs() < 1e-9);
    }
}
