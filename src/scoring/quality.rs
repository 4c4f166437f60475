use serde::{Deserialize, Serialize};

use super::{contains_any, matched_weight, owned, weighted, WeightedPattern};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Below this many characters the response is too short.
    pub very_short_len: usize,
    pub very_short_penalty: f64,
    pub short_len: usize,
    pub short_penalty: f64,
    /// Above this many characters the response is rambling.
    pub long_len: usize,
    pub long_penalty: f64,

    pub negative: Vec<WeightedPattern>,
    pub vague: Vec<WeightedPattern>,
    pub positive: Vec<WeightedPattern>,

    /// Input words that mark a shopping query.
    pub shopping_keywords: Vec<String>,
    /// Response fragments that count as product content.
    pub product_indicators: Vec<String>,
    pub off_topic_penalty: f64,
    /// Mentions products without any bracketed catalog id.
    pub unreferenced_product_penalty: f64,

    pub per_product_bonus: f64,
    pub max_product_bonus: f64,

    pub garbage_input_patterns: Vec<String>,
    /// Responses longer than this to garbage input are penalized.
    pub garbage_response_len: usize,
    pub garbage_penalty: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            very_short_len: 30,
            very_short_penalty: 0.4,
            short_len: 100,
            short_penalty: 0.2,
            long_len: 3000,
            long_penalty: 0.2,
            negative: weighted(&[
                ("I don't know", 0.2),
                ("I cannot", 0.15),
                ("I'm not able", 0.2),
                ("error", 0.15),
                ("unfortunately", 0.1),
                ("I apologize", 0.1),
                ("I'm sorry, I", 0.15),
                ("unable to", 0.2),
                ("I don't have access", 0.2),
                ("I'm not sure", 0.15),
                ("that's outside my", 0.2),
                ("beyond my capabilities", 0.25),
                ("can't help with that", 0.2),
                ("not within my scope", 0.2),
            ]),
            vague: weighted(&[
                ("it depends", 0.15),
                ("there are many options", 0.1),
                ("various factors", 0.1),
                ("generally speaking", 0.1),
                ("in general", 0.05),
                ("could you be more specific", 0.2),
                ("what exactly are you looking for", 0.15),
                ("can you clarify", 0.15),
            ]),
            positive: weighted(&[
                ("here are", 0.05),
                ("recommend", 0.05),
                ("option", 0.03),
                ("feature", 0.03),
                ("price", 0.05),
                ("perfect for", 0.05),
                ("great choice", 0.05),
                ("based on your", 0.05),
                ("you might also like", 0.05),
            ]),
            shopping_keywords: owned(&[
                "buy", "product", "price", "recommend", "show", "find", "looking for", "want", "need",
            ]),
            product_indicators: owned(&["$", "price", "product", "[", "]", "recommend", "categories"]),
            off_topic_penalty: 0.25,
            unreferenced_product_penalty: 0.15,
            per_product_bonus: 0.05,
            max_product_bonus: 0.2,
            garbage_input_patterns: owned(&["asdf", "qwerty", "zxcv", "??", "idk", "💀", "🤷"]),
            garbage_response_len: 200,
            garbage_penalty: 0.2,
        }
    }
}

/// Scores how helpful a chatbot response is for its input.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, response: &str, input: &str, products_found: usize) -> f64 {
        let c = &self.config;
        let response_lower = response.to_lowercase();
        let input_lower = input.to_lowercase();
        let len = response.chars().count();

        let mut score = 1.0;

        if len < c.very_short_len {
            score -= c.very_short_penalty;
        } else if len < c.short_len {
            score -= c.short_penalty;
        } else if len > c.long_len {
            score -= c.long_penalty;
        }

        score -= matched_weight(&response_lower, &c.negative);
        score -= matched_weight(&response_lower, &c.vague);

        let is_shopping_query = contains_any(&input_lower, &c.shopping_keywords);
        if is_shopping_query
            && products_found == 0
            && !contains_any(&response_lower, &c.product_indicators)
        {
            score -= c.off_topic_penalty;
        }

        let mentions_products = response_lower.contains("product") || response_lower.contains("item");
        let has_product_ids = response.contains('[') && response.contains(']');
        if is_shopping_query && mentions_products && !has_product_ids {
            score -= c.unreferenced_product_penalty;
        }

        score += matched_weight(&response_lower, &c.positive);

        if products_found > 0 {
            score += (products_found as f64 * c.per_product_bonus).min(c.max_product_bonus);
        }

        if contains_any(&input_lower, &c.garbage_input_patterns) && len > c.garbage_response_len {
            score -= c.garbage_penalty;
        }

        score.clamp(0.0, 1.0)
    }
}
