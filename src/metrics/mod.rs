//! Metric series model, query construction and the reader over the backend.

pub mod reader;
pub mod stats;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::reader::{MetricsReader, TokenUsage};
pub use self::stats::{trend, TimeSeries};

/// Default query window (seconds).
pub const DEFAULT_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("invalid metric name '{0}': expected a dotted identifier")]
    InvalidMetricName(String),

    #[error("query window must be positive")]
    InvalidWindow,
}

/// One observation. Timestamps are the backend's (milliseconds since epoch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// A named, time-ordered series restricted to one query window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: String,
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn summarize(&self) -> MetricSummary {
        MetricSummary::from_values(&self.values())
    }
}

/// Coarse direction of a series, comparing early and late sub-windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Increasing => write!(f, "increasing"),
            Trend::Decreasing => write!(f, "decreasing"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

/// Aggregates derived from one [`MetricSeries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Last point's value; `None` for an empty series.
    pub latest: Option<f64>,
    /// Arithmetic mean; `0` for an empty series.
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub trend: Trend,
    pub points: usize,
}

impl MetricSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let ts = TimeSeries::new(values.to_vec());
        Self {
            latest: values.last().copied(),
            average: ts.mean(),
            min: ts.min(),
            max: ts.max(),
            trend: ts.trend(),
            points: values.len(),
        }
    }

    /// Placeholder for a metric with no data, used where a bundle must list
    /// every key.
    pub fn zero() -> Self {
        Self {
            latest: Some(0.0),
            average: 0.0,
            min: 0.0,
            max: 0.0,
            trend: Trend::Stable,
            points: 0,
        }
    }
}

/// Backend aggregation applied across the matching series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    #[default]
    Avg,
    Sum,
    Max,
    Min,
    P99,
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregator::Avg => write!(f, "avg"),
            Aggregator::Sum => write!(f, "sum"),
            Aggregator::Max => write!(f, "max"),
            Aggregator::Min => write!(f, "min"),
            Aggregator::P99 => write!(f, "p99"),
        }
    }
}

/// A validated (metric, filter, window) tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    metric: String,
    aggregator: Aggregator,
    service: Option<String>,
    window_secs: u64,
    as_count: bool,
}

impl MetricQuery {
    /// `avg` over all services for the default window.
    pub fn new(metric: &str) -> Result<Self, MetricsError> {
        if !is_dotted_identifier(metric) {
            return Err(MetricsError::InvalidMetricName(metric.to_string()));
        }
        Ok(Self {
            metric: metric.to_string(),
            aggregator: Aggregator::default(),
            service: None,
            window_secs: DEFAULT_WINDOW_SECS,
            as_count: false,
        })
    }

    pub fn aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// `"*"` clears the filter; anything else matches the `service` tag exactly.
    pub fn service(mut self, service: &str) -> Self {
        self.service = match service {
            "*" | "" => None,
            s => Some(s.to_string()),
        };
        self
    }

    pub fn window_secs(mut self, secs: u64) -> Result<Self, MetricsError> {
        if secs == 0 {
            return Err(MetricsError::InvalidWindow);
        }
        self.window_secs = secs;
        Ok(self)
    }

    /// Roll the series up as counts rather than rates.
    pub fn as_count(mut self) -> Self {
        self.as_count = true;
        self
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn window(&self) -> u64 {
        self.window_secs
    }

    /// Backend query string, e.g. `sum:llm.tokens.input{service:chatbotservice}.as_count()`.
    pub fn to_query_string(&self) -> String {
        let filter = match &self.service {
            Some(s) => format!("service:{}", s),
            None => "*".to_string(),
        };
        let suffix = if self.as_count { ".as_count()" } else { "" };
        format!("{}:{}{{{}}}{}", self.aggregator, self.metric, filter, suffix)
    }
}

fn is_dotted_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_default() {
        let q = MetricQuery::new("llm.request.duration").unwrap();
        assert_eq!(q.to_query_string(), "avg:llm.request.duration{*}");
        assert_eq!(q.window(), 3600);
    }

    #[test]
    fn test_query_string_service_and_count() {
        let q = MetricQuery::new("trace.flask.request.errors")
            .unwrap()
            .aggregator(Aggregator::Sum)
            .service("chatbotservice")
            .as_count();
        assert_eq!(
            q.to_query_string(),
            "sum:trace.flask.request.errors{service:chatbotservice}.as_count()"
        );
    }

    #[test]
    fn test_star_service_means_no_filter() {
        let q = MetricQuery::new("ml_obs.span").unwrap().service("*");
        assert_eq!(q.to_query_string(), "avg:ml_obs.span{*}");
    }

    #[test]
    fn test_invalid_names_rejected() {
        for bad in ["", "llm..rate", ".llm", "llm.rate.", "llm rate", "llm.{x}"] {
            assert_eq!(
                MetricQuery::new(bad),
                Err(MetricsError::InvalidMetricName(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        let q = MetricQuery::new("llm.error.rate").unwrap();
        assert_eq!(q.window_secs(0), Err(MetricsError::InvalidWindow));
    }

    #[test]
    fn test_summary_of_empty_series() {
        let s = MetricSeries {
            name: "llm.error.rate".into(),
            points: vec![],
        }
        .summarize();
        assert_eq!(s.latest, None);
        assert_eq!(s.average, 0.0);
        assert_eq!(s.trend, Trend::Stable);
        assert_eq!(s.points, 0);
    }

    #[test]
    fn test_summary_fields() {
        let s = MetricSummary::from_values(&[1.0, 1.0, 3.0, 3.0]);
        assert_eq!(s.latest, Some(3.0));
        assert_eq!(s.average, 2.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.trend, Trend::Increasing);
    }
}
