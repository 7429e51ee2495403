use scraper::Selector;

use crate::plugins::extractors::price::normalize_price;
use crate::plugins::traits::{ExtractionRule, Page, PriceBounds, RuleOutcome};

/// Reads the price from the first matching element of a CSS selector.
pub struct SelectorRule {
    name: String,
    selector: Selector,
    bounds: PriceBounds,
}

impl SelectorRule {
    pub fn new(profile: &str, selector: &str, bounds: PriceBounds) -> Result<Self, String> {
        let parsed = Selector::parse(selector)
            .map_err(|e| format!("invalid CSS selector: {:?}", e))?;

        Ok(Self {
            name: format!("{}:{}", profile, selector),
            selector: parsed,
            bounds,
        })
    }
}

impl ExtractionRule for SelectorRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self, page: &Page<'_>) -> RuleOutcome {
        let mut malformed = None;
        let mut out_of_range = None;

        for element in page.document.select(&self.selector) {
            let text = element.text().collect::<Vec<_>>().join(" ");
            // Microdata prices often live in the content attribute with an empty body.
            let candidate = if text.trim().is_empty() {
                element.value().attr("content").unwrap_or_default().to_string()
            } else {
                text
            };

            match normalize_price(&candidate) {
                Ok(price) if self.bounds.contains(price) => return RuleOutcome::Found(price),
                Ok(price) => out_of_range = Some(price),
                Err(e) => {
                    malformed.get_or_insert(e.to_string());
                }
            }
        }

        match (malformed, out_of_range) {
            (_, Some(price)) => RuleOutcome::Skipped(format!("{} outside accepted range", price)),
            (Some(reason), None) => RuleOutcome::Malformed(reason),
            (None, None) => RuleOutcome::Skipped("no matching element".to_string()),
        }
    }
}
