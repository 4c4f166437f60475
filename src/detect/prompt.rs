//! Prompt construction for deep analysis and parsing of the model's reply.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{AnalysisError, FailurePrediction, PredictionResult, PredictionStatus};
use crate::metrics::{MetricSummary, TokenUsage};

/// Render an optional number the way the prompts expect (`N/A` when absent).
fn num(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{}", v),
        None => "N/A".to_string(),
    }
}

/// Context block for the error-prediction prompt.
pub fn format_metrics_context(
    error_metrics: &BTreeMap<String, MetricSummary>,
    llm_metrics: &BTreeMap<String, Option<MetricSummary>>,
) -> String {
    let mut out = String::from("**Error Metrics (Last Hour):**\n");
    for (name, s) in error_metrics {
        let _ = writeln!(
            out,
            "- {}: latest={}, trend={}, avg={}",
            name,
            num(s.latest),
            s.trend,
            s.average
        );
    }

    out.push_str("\n**LLM Metrics (Last 24 Hours):**\n");
    for (name, s) in llm_metrics {
        match s {
            Some(s) => {
                let _ = writeln!(out, "- {}: latest={}, avg={}", name, num(s.latest), s.average);
            }
            None => {
                let _ = writeln!(out, "- {}: latest=N/A, avg=N/A", name);
            }
        }
    }
    out.trim_end().to_string()
}

/// Full error-prediction prompt around a formatted context block.
pub fn error_prediction_prompt(context: &str) -> String {
    format!(
        r#"You are an expert SRE analyzing observability data for an e-commerce platform.

## Platform Architecture
The platform has the following LLM-powered services:
1. **chatbotservice** - customer chat interface, handles product queries and recommendations
2. **shoppingassistantservice** - shopping assistant for personalized recommendations
3. **peau_agent** - proactive engagement and upsell agent, sends proactive messages

All services call the same hosted LLM and share project quotas.

## Current Telemetry Data
{context}

## Your Task
Analyze these metrics and predict SPECIFIC failures that may occur in the next 2 hours.
For each service showing concerning metrics, state what will fail, when, what users will
experience, and how to prevent it.

## Response Format (JSON)
Respond with valid JSON only:
{{
    "probability": <float 0-1, overall probability of service degradation>,
    "confidence": <float 0-1, confidence in this prediction>,
    "status": "<healthy|warning|critical>",
    "failure_predictions": [
        {{
            "service": "<exact service name>",
            "failure_mode": "<what will fail>",
            "probability": <float 0-1>,
            "time_to_failure_minutes": <estimated minutes until failure>,
            "user_impact": "<what users will experience>",
            "symptoms": ["<observable symptom>"],
            "root_cause": "<technical root cause>",
            "mitigation": "<specific action to prevent>"
        }}
    ],
    "affected_services": ["<services that may be affected>"],
    "time_to_issue_hours": <hours until first failure>,
    "recommended_actions": ["<specific action with service name>"],
    "prediction_markdown": "<complete markdown-formatted analysis>"
}}

Be specific, actionable, and focus on preventing failures before they occur."#
    )
}

/// Cost-optimization prompt over 24 h token usage.
pub fn cost_prompt(usage: &TokenUsage) -> String {
    format!(
        r#"You are a cloud cost optimization expert analyzing LLM token usage for an e-commerce platform.

Token usage for the last {hours} hours:

| Metric | Value |
|--------|-------|
| Estimated input tokens | {input} |
| Output tokens | {output} |
| Total tokens (estimated) | {total} |
| LLM spans | {spans} |
| Input cost | ${input_cost:.4} |

**Total Daily Cost:** ${cost:.2}

Analyze this usage and provide cost optimization recommendations.

Respond in JSON format:
{{
    "daily_cost": <current daily cost>,
    "monthly_projected": <projected monthly cost>,
    "potential_savings_monthly": <potential monthly savings in USD>,
    "savings_percentage": <potential savings as percentage>,
    "analysis": "<brief analysis of spending patterns>",
    "recommendations": [
        {{
            "title": "<short title>",
            "description": "<detailed description>",
            "estimated_savings": <monthly savings in USD>,
            "effort": "<low|medium|high>",
            "priority": <1-5, 1 being highest>
        }}
    ]
}}

Focus on practical optimizations: response caching, prompt size reduction, model tiering,
request batching, and eliminating redundant queries."#,
        hours = usage.window_secs / 3600,
        input = usage.estimated_input_tokens,
        output = usage.output_tokens as u64,
        total = usage.total_tokens_estimated,
        spans = usage.span_count as u64,
        input_cost = usage.input_cost_usd,
        cost = usage.cost_usd_total,
    )
}

/// Executive health-summary prompt.
pub fn health_prompt(
    quick_metrics: &BTreeMap<String, f64>,
    concerns: &[String],
    llm_metrics: &BTreeMap<String, Option<MetricSummary>>,
) -> String {
    let avg = |key: &str| num(llm_metrics.get(key).and_then(|s| s.as_ref()).map(|s| s.average));
    let concerns = if concerns.is_empty() {
        "None".to_string()
    } else {
        concerns.join(", ")
    };

    format!(
        r#"You are a senior SRE creating a status update for an e-commerce platform with LLM-powered services.

Current Metrics:
Quick Health Check:
- Error Rate: {error_rate}
- Latency: {latency}s
- Hallucination Rate: {hallucination}
- Concerns: {concerns}

Last Hour LLM Metrics:
- Request Duration Avg: {duration}s
- Quality Score Avg: {quality}

Generate a brief, executive-friendly health summary.

Respond in JSON format:
{{
    "overall_status": "<healthy|warning|critical>",
    "summary": "<2-3 sentence executive summary>",
    "highlights": ["<positive highlights, max 3>"],
    "concerns": ["<concerns if any, max 3>"],
    "recommendations": ["<recommended actions if any, max 3>"]
}}

Keep it concise and actionable. Focus on business impact."#,
        error_rate = num(quick_metrics.get("error_rate").copied()),
        latency = num(quick_metrics.get("latency_avg").copied()),
        hallucination = num(quick_metrics.get("hallucination_rate").copied()),
        duration = avg("request_duration"),
        quality = avg("quality_score"),
    )
}

/// Pull a JSON object out of model output: a fenced ```json block, else the
/// outermost `{...}` span, else the whole text.
pub fn extract_json(text: &str) -> Result<Value, AnalysisError> {
    let candidate = fenced_json(text)
        .or_else(|| outer_braces(text))
        .unwrap_or(text)
        .trim();

    serde_json::from_str(candidate).map_err(|e| AnalysisError::Parse(e.to_string()))
}

fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    probability: Option<Value>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    failure_predictions: Option<Value>,
    #[serde(default)]
    affected_services: Option<Value>,
    #[serde(default)]
    recommended_actions: Option<Value>,
    #[serde(default)]
    time_to_issue_hours: Option<Value>,
    #[serde(default)]
    prediction_markdown: Option<Value>,
    #[serde(default)]
    root_cause: Option<Value>,
    #[serde(default)]
    cause: Option<Value>,
}

fn as_f64(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn text(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::to_string)
}

/// A list field as strings. A bare string counts as a one-element list.
fn string_list(v: Option<&Value>) -> Vec<String> {
    let item = |v: &Value| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    match v {
        Some(Value::Array(items)) => items.iter().filter_map(item).collect(),
        Some(other) => item(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Coerce the loosely typed fields of one forecast entry before decoding it.
fn failure_prediction(mut v: Value) -> Option<FailurePrediction> {
    if !v.is_object() {
        debug!(entry = %v, "dropping failure prediction that is not an object");
        return None;
    }
    let obj = v.as_object_mut()?;
    for key in ["probability", "time_to_failure_minutes"] {
        if let Some(raw) = obj.get(key) {
            let coerced = as_f64(raw).map_or(Value::Null, Value::from);
            if coerced.is_null() && !raw.is_null() {
                debug!(field = key, value = %raw, "ignoring non-numeric failure prediction field");
            }
            obj.insert(key.to_string(), coerced);
        }
    }
    if obj.get("probability").map_or(false, Value::is_null) {
        obj.remove("probability");
    }
    if let Some(raw) = obj.get("symptoms") {
        let symptoms = string_list(Some(raw));
        obj.insert("symptoms".to_string(), Value::from(symptoms));
    }
    for key in ["service", "failure_mode", "user_impact", "root_cause", "mitigation"] {
        if obj.get(key).map_or(false, |f| !f.is_string()) {
            obj.remove(key);
        }
    }
    match serde_json::from_value(v) {
        Ok(fp) => Some(fp),
        Err(e) => {
            debug!(error = %e, "dropping undecodable failure prediction");
            None
        }
    }
}

/// Parse the error-prediction reply. Output without a numeric `probability`
/// is an [`AnalysisError::Parse`].
pub fn parse_prediction(reply: &str) -> Result<PredictionResult, AnalysisError> {
    let value = extract_json(reply)?;
    let raw: RawPrediction =
        serde_json::from_value(value).map_err(|e| AnalysisError::Parse(e.to_string()))?;

    let probability = raw
        .probability
        .as_ref()
        .and_then(as_f64)
        .ok_or_else(|| AnalysisError::Parse("missing numeric probability".to_string()))?
        .clamp(0.0, 1.0);

    let status = text(raw.status.as_ref())
        .as_deref()
        .and_then(PredictionStatus::parse_reported)
        .unwrap_or_else(|| PredictionStatus::from_probability(probability));

    let entries = match raw.failure_predictions {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    };
    let mut failure_predictions: Vec<FailurePrediction> =
        entries.into_iter().filter_map(failure_prediction).collect();
    for fp in &mut failure_predictions {
        fp.probability = fp.probability.clamp(0.0, 1.0);
    }

    let root_cause = failure_predictions
        .iter()
        .max_by(|a, b| a.probability.total_cmp(&b.probability))
        .map(|top| {
            format!(
                "{}: {} - {}",
                top.service.as_deref().unwrap_or("Unknown"),
                top.failure_mode.as_deref().unwrap_or("Unknown failure"),
                top.root_cause.as_deref().unwrap_or("Unknown cause"),
            )
        })
        .or_else(|| text(raw.root_cause.as_ref()))
        .or_else(|| text(raw.cause.as_ref()))
        .unwrap_or_else(|| "Unknown".to_string());

    let mut result = PredictionResult {
        probability,
        confidence: raw.confidence.as_ref().and_then(as_f64).map(|c| c.clamp(0.0, 1.0)),
        status,
        root_cause,
        affected_services: string_list(raw.affected_services.as_ref()),
        recommended_actions: string_list(raw.recommended_actions.as_ref()),
        time_to_issue_hours: raw
            .time_to_issue_hours
            .as_ref()
            .and_then(as_f64)
            .filter(|h| *h > 0.0),
        failure_predictions,
        report_markdown: String::new(),
    };

    let model_markdown = text(raw.prediction_markdown.as_ref()).filter(|m| !m.trim().is_empty());
    result.report_markdown = match model_markdown {
        Some(md) => md,
        None => report_markdown(&result),
    };
    Ok(result)
}

/// Markdown report assembled from the structured fields.
pub fn report_markdown(p: &PredictionResult) -> String {
    let mut lines = vec![
        "## AI Failure Prediction Report".to_string(),
        String::new(),
        "### Overall Assessment".to_string(),
        format!("**Status:** {}", p.status.as_str().to_uppercase()),
        format!("**Probability of Service Degradation:** {:.1}%", p.probability * 100.0),
    ];
    if let Some(c) = p.confidence.filter(|c| *c > 0.0) {
        lines.push(format!("**Analysis Confidence:** {:.1}%", c * 100.0));
    }
    if let Some(h) = p.time_to_issue_hours {
        if h < 1.0 {
            lines.push(format!(
                "**Estimated Time to First Failure:** ~{} minutes",
                (h * 60.0) as u64
            ));
        } else {
            lines.push(format!("**Estimated Time to First Failure:** {:.1} hours", h));
        }
    }

    if !p.failure_predictions.is_empty() {
        lines.push(String::new());
        lines.push("### Services at Risk".to_string());
        lines.push(String::new());
        for (i, fp) in p.failure_predictions.iter().enumerate() {
            let risk = if fp.probability >= 0.8 {
                "High"
            } else if fp.probability >= 0.5 {
                "Medium"
            } else {
                "Low"
            };
            lines.push(format!(
                "#### {}. {}",
                i + 1,
                fp.service.as_deref().unwrap_or("Unknown Service")
            ));
            lines.push(format!(
                "- **Risk Level:** {} ({:.0}% probability)",
                risk,
                fp.probability * 100.0
            ));
            lines.push(format!(
                "- **Predicted Failure:** {}",
                fp.failure_mode.as_deref().unwrap_or("Unknown failure")
            ));
            if let Some(m) = fp.time_to_failure_minutes {
                lines.push(format!("- **Time to Failure:** ~{} minutes", m));
            }
            lines.push(format!(
                "- **User Impact:** {}",
                fp.user_impact.as_deref().unwrap_or("Unknown impact")
            ));
            if !fp.symptoms.is_empty() {
                lines.push(format!("- **Symptoms:** {}", fp.symptoms.join(", ")));
            }
            lines.push(format!(
                "- **Root Cause:** {}",
                fp.root_cause.as_deref().unwrap_or("Unknown cause")
            ));
            lines.push(format!(
                "- **Mitigation:** {}",
                fp.mitigation.as_deref().unwrap_or("No mitigation specified")
            ));
            lines.push(String::new());
        }
    } else if !p.affected_services.is_empty() {
        lines.push(String::new());
        lines.push("### Affected Services".to_string());
        lines.push(format!("**Services at Risk:** {}", p.affected_services.join(", ")));
        lines.push(String::new());
        lines.push("### Root Cause Analysis".to_string());
        lines.push(p.root_cause.clone());
    }

    if !p.recommended_actions.is_empty() {
        lines.push(String::new());
        lines.push("### Recommended Actions".to_string());
        for (i, action) in p.recommended_actions.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, action));
        }
    }

    lines.push(String::new());
    lines.push("---".to_string());
    lines.push("*Generated by the Observability Insights Service*".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Trend;

    #[test]
    fn test_extract_fenced_block() {
        let text = "Here you go:\n```json\n{\"probability\": 0.3}\n```\nThanks";
        assert_eq!(extract_json(text).unwrap()["probability"], 0.3);
    }

    #[test]
    fn test_extract_outer_braces() {
        let text = "Analysis {\"probability\": 0.7, \"nested\": {\"a\": 1}} done";
        let v = extract_json(text).unwrap();
        assert_eq!(v["nested"]["a"], 1);
    }

    #[test]
    fn test_extract_garbage_is_parse_error() {
        assert!(matches!(
            extract_json("the system looks fine"),
            Err(AnalysisError::Parse(_))
        ));
        assert!(matches!(extract_json("{not json}"), Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_missing_probability_is_parse_error() {
        let err = parse_prediction(r#"{"status": "healthy"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
        let err = parse_prediction(r#"{"probability": "high"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
        let err = parse_prediction(r#"{"probability": null}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
    }

    #[test]
    fn test_probability_clamped_and_status_derived() {
        let p = parse_prediction(r#"{"probability": 1.7, "status": "bogus"}"#).unwrap();
        assert_eq!(p.probability, 1.0);
        assert_eq!(p.status, PredictionStatus::Critical);

        let p = parse_prediction(r#"{"probability": -0.2, "confidence": 3}"#).unwrap();
        assert_eq!(p.probability, 0.0);
        assert_eq!(p.confidence, Some(1.0));
        assert_eq!(p.status, PredictionStatus::Healthy);
    }

    #[test]
    fn test_model_status_wins_when_valid() {
        let p = parse_prediction(r#"{"probability": 0.9, "status": "warning"}"#).unwrap();
        assert_eq!(p.status, PredictionStatus::Warning);
    }

    #[test]
    fn test_root_cause_from_top_failure_prediction() {
        let text = r#"```json
{
  "probability": 0.85,
  "failure_predictions": [
    {"service": "peau_agent", "failure_mode": "Quality degradation", "probability": 0.4, "root_cause": "prompt drift"},
    {"service": "chatbotservice", "failure_mode": "Request timeouts", "probability": 0.9, "root_cause": "quota exhaustion"}
  ],
  "affected_services": ["chatbotservice"],
  "recommended_actions": ["Raise chatbotservice quota"],
  "time_to_issue_hours": 0.5
}
```"#;
        let p = parse_prediction(text).unwrap();
        assert_eq!(p.root_cause, "chatbotservice: Request timeouts - quota exhaustion");
        assert_eq!(p.time_to_issue_hours, Some(0.5));
        assert!(p.report_markdown.contains("~30 minutes"));
        assert!(p.report_markdown.contains("#### 2. chatbotservice"));
        assert!(p.report_markdown.contains("1. Raise chatbotservice quota"));
    }

    #[test]
    fn test_root_cause_fallbacks() {
        let p = parse_prediction(r#"{"probability": 0.2, "cause": "steady state"}"#).unwrap();
        assert_eq!(p.root_cause, "steady state");
        let p = parse_prediction(r#"{"probability": 0.2}"#).unwrap();
        assert_eq!(p.root_cause, "Unknown");
    }

    #[test]
    fn test_model_markdown_is_kept() {
        let p = parse_prediction(r###"{"probability": 0.6, "prediction_markdown": "## Report"}"###)
            .unwrap();
        assert_eq!(p.report_markdown, "## Report");
    }

    #[test]
    fn test_loosely_typed_fields_are_coerced() {
        let p = parse_prediction(
            r#"{"probability": 0.7, "status": 2, "affected_services": "cartservice",
                "recommended_actions": ["Scale out", 42, null], "root_cause": 17}"#,
        )
        .unwrap();
        assert_eq!(p.status, PredictionStatus::Warning);
        assert_eq!(p.affected_services, vec!["cartservice".to_string()]);
        assert_eq!(p.recommended_actions, vec!["Scale out".to_string(), "42".to_string()]);
        assert_eq!(p.root_cause, "Unknown");
    }

    #[test]
    fn test_failure_prediction_string_probability_is_kept() {
        let p = parse_prediction(
            r#"{"probability": 0.6, "failure_predictions": [
                {"service": "cartservice", "probability": "0.7", "symptoms": "slow checkout"},
                {"service": "adservice", "probability": "likely"},
                "not an entry"
            ]}"#,
        )
        .unwrap();
        assert_eq!(p.failure_predictions.len(), 2);
        assert_eq!(p.failure_predictions[0].probability, 0.7);
        assert_eq!(p.failure_predictions[0].symptoms, vec!["slow checkout".to_string()]);
        assert_eq!(p.failure_predictions[1].probability, 0.0);
        assert!(p.root_cause.starts_with("cartservice:"));
    }

    #[test]
    fn test_metrics_context_lists_every_key() {
        let mut errors = BTreeMap::new();
        errors.insert("chatbot_errors".to_string(), MetricSummary::from_values(&[1.0, 1.0, 4.0, 4.0]));
        let mut llm = BTreeMap::new();
        llm.insert("quality_score".to_string(), None);

        let ctx = format_metrics_context(&errors, &llm);
        assert!(ctx.contains("- chatbot_errors: latest=4, trend=increasing, avg=2.5"));
        assert!(ctx.contains("- quality_score: latest=N/A, avg=N/A"));
        assert_eq!(MetricSummary::zero().trend, Trend::Stable);
    }

    #[test]
    fn test_prompts_carry_context() {
        let prompt = error_prediction_prompt("CTX-BLOCK");
        assert!(prompt.contains("CTX-BLOCK"));
        assert!(prompt.contains("\"failure_predictions\""));
        assert!(prompt.contains("peau_agent"));

        let mut quick = BTreeMap::new();
        quick.insert("latency_avg".to_string(), 4.0);
        let health = health_prompt(&quick, &["Latency elevated: 4.00s".to_string()], &BTreeMap::new());
        assert!(health.contains("- Latency: 4s"));
        assert!(health.contains("- Error Rate: N/A"));
        assert!(health.contains("Concerns: Latency elevated: 4.00s"));
    }
}
