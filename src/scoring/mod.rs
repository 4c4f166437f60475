//! Heuristic text scoring for chatbot responses and prompts.
//!
//! All scorers are pure functions over text returning a value clamped to
//! `[0, 1]`. Pattern lists and weights are data so they can be tuned or
//! tested independently of the matching logic.

pub mod hallucination;
pub mod injection;
pub mod quality;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use self::hallucination::ProductIdMatcher;
pub use self::injection::{InjectionConfig, InjectionScorer};
pub use self::quality::{QualityConfig, QualityScorer};

/// A case-insensitive substring and the weight it contributes when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPattern {
    pub pattern: String,
    pub weight: f64,
}

impl WeightedPattern {
    pub fn new(pattern: &str, weight: f64) -> Self {
        Self {
            pattern: pattern.to_string(),
            weight,
        }
    }
}

pub(crate) fn weighted(pairs: &[(&str, f64)]) -> Vec<WeightedPattern> {
    pairs.iter().map(|(p, w)| WeightedPattern::new(p, *w)).collect()
}

pub(crate) fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Sum of the weights of every pattern found in `haystack_lower`.
pub(crate) fn matched_weight(haystack_lower: &str, patterns: &[WeightedPattern]) -> f64 {
    patterns
        .iter()
        .filter(|p| haystack_lower.contains(&p.pattern.to_lowercase()))
        .map(|p| p.weight)
        .sum()
}

pub(crate) fn contains_any(haystack_lower: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack_lower.contains(n.as_str()))
}

/// Pattern data for every scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub quality: QualityConfig,
    pub injection: InjectionConfig,
}

/// All three scores for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub quality_score: Option<f64>,
    pub injection_score: f64,
    pub invalid_product_rate: Option<f64>,
}

/// The three scorers built from one [`ScoringConfig`].
#[derive(Debug, Clone)]
pub struct Scorer {
    quality: QualityScorer,
    injection: InjectionScorer,
    products: ProductIdMatcher,
}

impl Scorer {
    pub fn new(config: &ScoringConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            quality: QualityScorer::new(config.quality.clone()),
            injection: InjectionScorer::new(config.injection.clone()),
            products: ProductIdMatcher::new()?,
        })
    }

    pub fn injection(&self) -> &InjectionScorer {
        &self.injection
    }

    /// Score one exchange. Response-dependent scores are `None` without a
    /// response; the product rate also needs a catalog.
    pub fn score(
        &self,
        prompt: &str,
        response: Option<&str>,
        products_found: usize,
        catalog: Option<&HashSet<String>>,
    ) -> ScoreReport {
        ScoreReport {
            quality_score: response.map(|r| self.quality.score(r, prompt, products_found)),
            injection_score: self.injection.score(prompt),
            invalid_product_rate: response
                .zip(catalog)
                .map(|(r, ids)| self.products.invalid_product_rate(r, ids)),
        }
    }
}
