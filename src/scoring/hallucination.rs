use std::collections::HashSet;

use regex::Regex;

/// Finds bracketed catalog ids (`[OLJCESPC7Z]`) in a response.
#[derive(Debug, Clone)]
pub struct ProductIdMatcher {
    pattern: Regex,
}

impl ProductIdMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"\[([A-Z0-9]+)\]")?,
        })
    }

    /// Every id mentioned, in order, duplicates included.
    pub fn mentioned<'a>(&self, response: &'a str) -> Vec<&'a str> {
        self.pattern
            .captures_iter(response)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Fraction of mentioned ids missing from the catalog; `0` when the
    /// response mentions none.
    pub fn invalid_product_rate(&self, response: &str, valid_ids: &HashSet<String>) -> f64 {
        let mentioned = self.mentioned(response);
        if mentioned.is_empty() {
            return 0.0;
        }
        let invalid = mentioned.iter().filter(|id| !valid_ids.contains(**id)).count();
        invalid as f64 / mentioned.len() as f64
    }
}
