//! Reasoning-model seam and the Vertex AI Gemini REST client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use super::AnalysisError;
use crate::config::AnalysisConfig;

/// An opaque text-in/text-out reasoning call.
#[async_trait::async_trait]
pub trait ReasoningModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError>;
}

/// Run one model call under `deadline`.
pub async fn generate_within(
    model: &dyn ReasoningModel,
    prompt: &str,
    deadline: Duration,
) -> Result<String, AnalysisError> {
    match tokio::time::timeout(deadline, model.generate(prompt)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(model = model.name(), secs = deadline.as_secs(), "reasoning model call timed out");
            Err(AnalysisError::Timeout(deadline.as_secs()))
        }
    }
}

/// Build the configured model, or [`UnconfiguredModel`] when neither an
/// endpoint nor a project is set.
pub fn from_config(config: &AnalysisConfig) -> Arc<dyn ReasoningModel> {
    match config.endpoint_url() {
        Some(endpoint) => match GeminiClient::new(
            endpoint,
            config.model.clone(),
            config.access_token.clone(),
            config.timeout(),
        ) {
            Ok(client) => {
                info!(model = %config.model, "reasoning model initialized");
                Arc::new(client)
            }
            Err(e) => {
                error!(error = %e, "failed to initialize reasoning model");
                Arc::new(UnconfiguredModel::new(e.to_string()))
            }
        },
        None => {
            warn!("no analysis endpoint or PROJECT_ID configured - deep analysis disabled");
            Arc::new(UnconfiguredModel::new(
                "set analysis.endpoint or PROJECT_ID".to_string(),
            ))
        }
    }
}

/// `generateContent` client for Gemini models.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    endpoint: String,
    model: String,
    access_token: Option<String>,
}

impl GeminiClient {
    pub fn new(
        endpoint: String,
        model: String,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Model(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            model,
            access_token: access_token.filter(|t| !t.is_empty()),
        })
    }

    pub(crate) fn request_body(prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        })
    }

    /// Concatenate the text parts of the first candidate.
    pub(crate) fn response_text(body: &Value) -> Option<String> {
        let parts = body
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait::async_trait]
impl ReasoningModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        let mut request = self.http.post(&self.endpoint).json(&Self::request_body(prompt));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Model("request timed out".to_string())
            } else {
                AnalysisError::Model(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Model(e.to_string()))?;

        if !status.is_success() {
            error!(status = status.as_u16(), body = %text, "model API error");
            return Err(AnalysisError::Model(format!("status {}: {}", status, text)));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::Model(format!("invalid response body: {}", e)))?;

        let out = Self::response_text(&body)
            .ok_or_else(|| AnalysisError::Model("response had no text candidates".to_string()))?;
        debug!(response_len = out.len(), "model responded");
        Ok(out)
    }
}

/// Stand-in used when no model is configured; every call fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredModel {
    reason: String,
}

impl UnconfiguredModel {
    pub fn new(reason: String) -> Self {
        Self { reason }
    }
}

#[async_trait::async_trait]
impl ReasoningModel for UnconfiguredModel {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, AnalysisError> {
        Err(AnalysisError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GeminiClient::request_body("hello");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"probability\":" }, { "text": " 0.4}" }] }
            }]
        });
        assert_eq!(
            GeminiClient::response_text(&body).as_deref(),
            Some("{\"probability\": 0.4}")
        );
    }

    #[test]
    fn test_response_text_missing() {
        assert!(GeminiClient::response_text(&json!({ "candidates": [] })).is_none());
        assert!(GeminiClient::response_text(&json!({})).is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_model_fails() {
        let model = from_config(&AnalysisConfig::default());
        assert_eq!(model.name(), "unconfigured");
        let err = model.generate("x").await.unwrap_err();
        assert!(matches!(err, AnalysisError::NotConfigured(_)));
    }

    struct SlowModel;

    #[async_trait::async_trait]
    impl ReasoningModel for SlowModel {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, AnalysisError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("{}".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_within_times_out() {
        let err = generate_within(&SlowModel, "x", Duration::from_secs(90))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout(90)));
    }

    #[test]
    fn test_from_config_with_endpoint() {
        let cfg = AnalysisConfig {
            endpoint: Some("http://127.0.0.1:9/generate".to_string()),
            ..Default::default()
        };
        assert_eq!(from_config(&cfg).name(), "gemini-2.0-flash");
    }
}
