//! TOML configuration for the insights service.
//!
//! Layered model: compiled-in defaults, then an optional TOML file, then the
//! environment variables the service has always recognised (`DD_API_KEY`,
//! `LATENCY_THRESHOLD`, `HTTP_PORT`, ...).

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::Thresholds;
use crate::scoring::ScoringConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "INSIGHTS_CONFIG";

/// Standard system location for the config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/boutique-insights/insights.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the insights daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl InsightsConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded insights configuration");
        Ok(config)
    }

    /// Reject values no check can work with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("thresholds.error_rate", t.error_rate),
            ("thresholds.latency_secs", t.latency_secs),
            ("thresholds.hallucination_rate", t.hallucination_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be a finite non-negative number, got {}", name, value);
            }
        }
        Ok(())
    }

    /// Resolve the effective configuration.
    ///
    /// File lookup order: `explicit`, then `INSIGHTS_CONFIG`, then
    /// [`SYSTEM_CONFIG_PATH`], then defaults. Environment overrides are
    /// applied last in every case.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            // An explicit path must exist and parse.
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Try `INSIGHTS_CONFIG`, then the system path, then defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "INSIGHTS_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Apply environment overrides through `lookup` (injected so tests do not
    /// have to mutate the process environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = text("DD_API_KEY") {
            self.backend.api_key = Some(v);
        }
        if let Some(v) = text("DD_APP_KEY") {
            self.backend.app_key = Some(v);
        }
        if let Some(v) = text("DD_SITE") {
            self.backend.site = v;
        }
        if let Some(v) = text("DD_ENV") {
            self.backend.env = v;
        }

        override_parsed(&text, "ERROR_PREDICTION_THRESHOLD", &mut self.thresholds.error_rate);
        override_parsed(&text, "LATENCY_THRESHOLD", &mut self.thresholds.latency_secs);
        override_parsed(
            &text,
            "HALLUCINATION_THRESHOLD",
            &mut self.thresholds.hallucination_rate,
        );

        override_parsed(
            &text,
            "ERROR_PREDICTION_INTERVAL_MINUTES",
            &mut self.schedule.error_prediction_minutes,
        );
        override_parsed(
            &text,
            "COST_ANALYSIS_INTERVAL_HOURS",
            &mut self.schedule.cost_analysis_hours,
        );
        override_parsed(
            &text,
            "HEALTH_SUMMARY_INTERVAL_MINUTES",
            &mut self.schedule.health_summary_minutes,
        );

        let mut port: Option<u16> = None;
        if let Some(raw) = text("HTTP_PORT") {
            match raw.trim().parse::<u16>() {
                Ok(p) => port = Some(p),
                Err(_) => warn!(key = "HTTP_PORT", value = %raw, "ignoring unparsable override"),
            }
        }
        if let Some(p) = port {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(h, _)| h.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind = format!("{}:{}", host, p);
        }

        if let Some(v) = text("PROJECT_ID") {
            self.analysis.project_id = Some(v);
        }
        if let Some(v) = text("LOCATION") {
            self.analysis.location = v;
        }
        if let Some(v) = text("GEMINI_MODEL") {
            self.analysis.model = v;
        }
        if let Some(v) = text("GOOGLE_ACCESS_TOKEN") {
            self.analysis.access_token = Some(v);
        }
        if let Some(v) = text("ANALYSIS_ENDPOINT") {
            self.analysis.endpoint = Some(v);
        }
    }

    /// Configuration view safe to return over HTTP: credentials are replaced
    /// by a presence marker.
    pub fn redacted(&self) -> serde_json::Value {
        let mut cfg = self.clone();
        cfg.backend.api_key = cfg.backend.api_key.as_ref().map(|_| "<redacted>".to_string());
        cfg.backend.app_key = cfg.backend.app_key.as_ref().map(|_| "<redacted>".to_string());
        cfg.analysis.access_token = cfg
            .analysis
            .access_token
            .as_ref()
            .map(|_| "<redacted>".to_string());
        serde_json::to_value(cfg).unwrap_or(serde_json::Value::Null)
    }
}

fn override_parsed<T, F>(text: &F, key: &str, slot: &mut T)
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = text(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => warn!(key, value = %raw, "ignoring unparsable override"),
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the HTTP API.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Metrics/alerting backend credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API key, required for every call.
    pub api_key: Option<String>,
    /// Application key, required for metric queries.
    pub app_key: Option<String>,
    /// Backend site, e.g. `us5.datadoghq.com`.
    pub site: String,
    /// Full base URL override (`https://api.<site>/api` when unset).
    pub base_url: Option<String>,
    /// Value of the `env:` tag attached to every emitted signal.
    pub env: String,
    /// Timeout for metric reads (seconds).
    pub read_timeout_secs: u64,
    /// Timeout for metric and event writes (seconds).
    pub write_timeout_secs: u64,
}

impl BackendConfig {
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}/api", self.site),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            app_key: None,
            site: "us5.datadoghq.com".to_string(),
            base_url: None,
            env: "hackathon".to_string(),
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Intervals for the three recurring jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub error_prediction_minutes: u64,
    pub cost_analysis_hours: u64,
    pub health_summary_minutes: u64,
    /// How often the polling loop looks for due jobs (seconds).
    pub tick_secs: u64,
}

impl ScheduleConfig {
    pub fn error_prediction_interval(&self) -> Duration {
        Duration::from_secs(self.error_prediction_minutes.max(1) * 60)
    }

    pub fn cost_analysis_interval(&self) -> Duration {
        Duration::from_secs(self.cost_analysis_hours.max(1) * 3600)
    }

    pub fn health_summary_interval(&self) -> Duration {
        Duration::from_secs(self.health_summary_minutes.max(1) * 60)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            error_prediction_minutes: 5,
            cost_analysis_hours: 1,
            health_summary_minutes: 15,
            tick_secs: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Reasoning model used for deep analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Full `generateContent` URL. Takes precedence over project/location/model.
    pub endpoint: Option<String>,
    /// Cloud project hosting the model.
    pub project_id: Option<String>,
    pub location: String,
    pub model: String,
    /// OAuth bearer token for the model endpoint.
    pub access_token: Option<String>,
    /// Deadline for one model call (seconds).
    pub timeout_secs: u64,
}

impl AnalysisConfig {
    /// Resolved `generateContent` URL, if enough is configured to build one.
    pub fn endpoint_url(&self) -> Option<String> {
        if let Some(url) = &self.endpoint {
            return Some(url.clone());
        }
        self.project_id.as_ref().map(|project| {
            format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
                loc = self.location,
                project = project,
                model = self.model,
            )
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            project_id: None,
            location: "us-central1".to_string(),
            model: "gemini-2.0-flash".to_string(),
            access_token: None,
            timeout_secs: 90,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
