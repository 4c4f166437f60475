//! HTTP client for a Datadog-compatible metrics/events API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use super::{
    BackendError, EventSubmission, MetricSubmission, MetricsBackend, QueryResponse, SignalSink,
};
use crate::config::BackendConfig;

/// Stateless client; `reqwest::Client` pools connections internally and is
/// cheap to clone, so one instance is shared by every invocation.
#[derive(Debug, Clone)]
pub struct DatadogClient {
    base_url: String,
    api_key: Option<String>,
    app_key: Option<String>,
    reader: Client,
    writer: Client,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    valid: bool,
}

impl DatadogClient {
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Self::new(
            &config.base_url(),
            config.api_key.clone(),
            config.app_key.clone(),
            config.read_timeout(),
            config.write_timeout(),
        )?;

        if client.api_key.is_none() {
            warn!("DD_API_KEY not set - backend reads and writes will fail");
        }
        if client.app_key.is_none() {
            warn!("DD_APP_KEY not set - metric queries will fail");
        }
        info!(base_url = %client.base_url, "backend client initialized");
        Ok(client)
    }

    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        app_key: Option<String>,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let build = |timeout: Duration| {
            Client::builder()
                .timeout(timeout)
                .pool_max_idle_per_host(10)
                .build()
                .map_err(|e| BackendError::Transport(e.to_string()))
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            app_key: app_key.filter(|k| !k.is_empty()),
            reader: build(read_timeout)?,
            writer: build(write_timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_key(&self) -> Result<&str, BackendError> {
        self.api_key
            .as_deref()
            .ok_or(BackendError::NotConfigured("DD_API_KEY"))
    }

    fn app_key(&self) -> Result<&str, BackendError> {
        self.app_key
            .as_deref()
            .ok_or(BackendError::NotConfigured("DD_APP_KEY"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        match status {
            200..=299 => Ok(response),
            401 | 403 => {
                error!(status, "backend rejected credentials");
                Err(BackendError::Auth(format!("status {}", status)))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                error!(status, body = %body, "backend request failed");
                Err(BackendError::Status { status, body })
            }
        }
    }
}

/// Intake body for one metric point.
pub(crate) fn series_body(metric: &MetricSubmission) -> Value {
    json!({
        "series": [{
            "metric": metric.metric,
            "type": metric.kind.intake_code(),
            "points": [{ "timestamp": metric.timestamp, "value": metric.value }],
            "tags": metric.tags,
        }]
    })
}

/// Intake body for one event.
pub(crate) fn event_body(event: &EventSubmission) -> Value {
    let mut body = json!({
        "title": event.title,
        "text": event.text,
        "alert_type": event.alert_type,
        "priority": event.priority,
        "tags": event.tags,
        "source_type_name": "observability_insights",
        "date_happened": event.date_happened,
    });
    if let Some(key) = &event.aggregation_key {
        body["aggregation_key"] = Value::String(key.clone());
    }
    body
}

#[async_trait::async_trait]
impl MetricsBackend for DatadogClient {
    #[instrument(skip(self), fields(backend = "datadog"))]
    async fn query(&self, query: &str, from: i64, to: i64) -> Result<QueryResponse, BackendError> {
        let request = self
            .reader
            .get(format!("{}/v1/query", self.base_url))
            .header("DD-API-KEY", self.api_key()?)
            .header("DD-APPLICATION-KEY", self.app_key()?)
            .query(&[
                ("query", query.to_string()),
                ("from", from.to_string()),
                ("to", to.to_string()),
            ]);

        let response = self.send(request).await?;
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        debug!(series = body.series.len(), "query returned");
        Ok(body)
    }

    #[instrument(skip(self), fields(backend = "datadog"))]
    async fn validate(&self) -> Result<(), BackendError> {
        let request = self
            .reader
            .get(format!("{}/v1/validate", self.base_url))
            .header("DD-API-KEY", self.api_key()?);

        let response = self.send(request).await?;
        let body: ValidateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        if body.valid {
            Ok(())
        } else {
            Err(BackendError::Auth("api key reported invalid".to_string()))
        }
    }
}

#[async_trait::async_trait]
impl SignalSink for DatadogClient {
    #[instrument(skip(self, metric), fields(metric = %metric.metric))]
    async fn submit_metric(&self, metric: &MetricSubmission) -> Result<(), BackendError> {
        let request = self
            .writer
            .post(format!("{}/v2/series", self.base_url))
            .header("DD-API-KEY", self.api_key()?)
            .json(&series_body(metric));

        self.send(request).await?;
        debug!("metric submitted");
        Ok(())
    }

    #[instrument(skip(self, event), fields(title = %event.title))]
    async fn post_event(&self, event: &EventSubmission) -> Result<(), BackendError> {
        let request = self
            .writer
            .post(format!("{}/v1/events", self.base_url))
            .header("DD-API-KEY", self.api_key()?)
            .json(&event_body(event));

        self.send(request).await?;
        debug!("event posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{EventPriority, MetricKind};

    fn client(api_key: Option<&str>, app_key: Option<&str>) -> DatadogClient {
        DatadogClient::new(
            "http://127.0.0.1:9/api/",
            api_key.map(String::from),
            app_key.map(String::from),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client(None, None).base_url(), "http://127.0.0.1:9/api");
    }

    #[test]
    fn test_from_config_uses_site() {
        let cfg = BackendConfig::default();
        let c = DatadogClient::from_config(&cfg).unwrap();
        assert_eq!(c.base_url(), "https://api.us5.datadoghq.com/api");
    }

    #[tokio::test]
    async fn test_query_without_credentials_is_not_configured() {
        let c = client(None, None);
        let err = c.query("avg:llm.error.rate{*}", 0, 60).await.unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured("DD_API_KEY")));
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_query_without_app_key_is_not_configured() {
        let c = client(Some("k"), Some(""));
        let err = c.query("avg:llm.error.rate{*}", 0, 60).await.unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured("DD_APP_KEY")));
    }

    #[test]
    fn test_series_body_shape() {
        let body = series_body(&MetricSubmission {
            metric: "llm.prediction.error_probability".into(),
            kind: MetricKind::Gauge,
            timestamp: 1_700_000_000,
            value: 0.1,
            tags: vec!["analysis_type:rule_based".into()],
        });

        let s = &body["series"][0];
        assert_eq!(s["metric"], "llm.prediction.error_probability");
        assert_eq!(s["type"], 1);
        assert_eq!(s["points"][0]["timestamp"], 1_700_000_000);
        assert_eq!(s["points"][0]["value"], 0.1);
        assert_eq!(s["tags"][0], "analysis_type:rule_based");
    }

    #[test]
    fn test_event_body_shape() {
        let mut event = EventSubmission {
            title: "t".into(),
            text: "body".into(),
            alert_type: "warning".into(),
            priority: EventPriority::Low,
            tags: vec![],
            date_happened: 42,
            aggregation_key: None,
        };
        let body = event_body(&event);
        assert_eq!(body["priority"], "low");
        assert_eq!(body["source_type_name"], "observability_insights");
        assert!(body.get("aggregation_key").is_none());

        event.aggregation_key = Some("error_prediction".into());
        assert_eq!(event_body(&event)["aggregation_key"], "error_prediction");
    }
}
