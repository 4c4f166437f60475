use serde::{Deserialize, Serialize};

use super::owned;

/// Phrase lists for prompt-injection detection. Every listed phrase found in
/// the prompt adds its tier's weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    pub high_risk: Vec<String>,
    pub high_risk_weight: f64,
    pub medium_risk: Vec<String>,
    pub medium_risk_weight: f64,
    pub code: Vec<String>,
    pub code_weight: f64,
    /// Score at or above which a prompt counts as an injection attempt.
    pub alert_threshold: f64,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            high_risk: owned(&[
                "ignore previous instructions",
                "ignore all instructions",
                "ignore your instructions",
                "disregard your instructions",
                "disregard all",
                "forget your rules",
                "forget everything",
                "you are now",
                "act as if",
                "pretend you are",
                "pretend to be",
                "jailbreak",
                "dan mode",
                "developer mode",
                "debug mode",
                "bypass safety",
                "bypass your",
                "override your",
                "unlock your",
                "reveal your system prompt",
                "show your instructions",
                "print your prompt",
            ]),
            high_risk_weight: 0.5,
            medium_risk: owned(&[
                "system prompt",
                "reveal your prompt",
                "show me your instructions",
                "what are your rules",
                "what is your prompt",
                "bypass",
                "override",
                "admin mode",
                "sudo",
                "root access",
                "api key",
                "secret key",
                "password",
                "credential",
            ]),
            medium_risk_weight: 0.35,
            code: owned(&[
                "drop table",
                "select *",
                "select * from",
                "union select",
                "; --",
                "' or '1'='1",
                "' or 1=1",
                "1=1",
                "<script>",
                "</script>",
                "eval(",
                "exec(",
                "execute(",
                "os.system",
                "subprocess",
                "import os",
                "${",
                "{{",
            ]),
            code_weight: 0.4,
            alert_threshold: 0.7,
        }
    }
}

/// Scores how likely a user prompt is an injection attempt.
#[derive(Debug, Clone, Default)]
pub struct InjectionScorer {
    config: InjectionConfig,
}

impl InjectionScorer {
    pub fn new(config: InjectionConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, prompt: &str) -> f64 {
        let c = &self.config;
        let lower = prompt.to_lowercase();
        let hits = |list: &[String]| {
            list.iter()
                .filter(|p| lower.contains(&p.to_lowercase()))
                .count() as f64
        };

        let score = hits(&c.high_risk) * c.high_risk_weight
            + hits(&c.medium_risk) * c.medium_risk_weight
            + hits(&c.code) * c.code_weight;
        score.clamp(0.0, 1.0)
    }

    pub fn is_attempt(&self, prompt: &str) -> bool {
        self.score(prompt) >= self.config.alert_threshold
    }
}
