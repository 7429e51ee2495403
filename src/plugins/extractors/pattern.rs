use regex::Regex;

use crate::plugins::extractors::price::normalize_price;
use crate::plugins::traits::{ExtractionRule, Page, PriceBounds, RuleOutcome};

/// Patterns tried on every page after the site-specific rules, in order.
pub const GENERIC_PATTERNS: &[&str] = &[
    r"\$[\d,]+\.\d{2}",
    r"(?:CAD|USD|US\$|Price:?\s*\$?)\s*([\d,]+\.?\d*)",
    r#"data-price=["']?([\d.,]+)"#,
    r#""price":\s*"?([\d.,]+)"#,
    r"[£€]\s?(\d[\d.,]*)",
];

/// Scans the raw markup with a regular expression. Capture group 1 is the
/// price when the pattern has one, otherwise the whole match.
pub struct PatternRule {
    name: String,
    regex: Regex,
    bounds: PriceBounds,
}

impl PatternRule {
    pub fn new(profile: &str, pattern: &str, bounds: PriceBounds) -> Result<Self, String> {
        let regex = Regex::new(pattern).map_err(|e| e.to_string())?;
        Ok(Self {
            name: format!("{}:/{}/", profile, pattern),
            regex,
            bounds,
        })
    }

    pub fn generic(bounds: PriceBounds) -> Result<Vec<Self>, String> {
        GENERIC_PATTERNS
            .iter()
            .map(|pattern| Self::new("generic", pattern, bounds))
            .collect()
    }
}

impl ExtractionRule for PatternRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self, page: &Page<'_>) -> RuleOutcome {
        let mut malformed = None;
        let mut skipped = 0usize;

        // The first in-range match wins; it is usually the main price rather than
        // accessories or ads further down the page.
        for captures in self.regex.captures_iter(page.markup) {
            let Some(candidate) = captures.get(1).or_else(|| captures.get(0)) else {
                continue;
            };

            match normalize_price(candidate.as_str()) {
                Ok(price) if self.bounds.contains(price) => return RuleOutcome::Found(price),
                Ok(_) => skipped += 1,
                Err(e) => {
                    malformed.get_or_insert(e.to_string());
                }
            }
        }

        match malformed {
            Some(reason) if skipped == 0 => RuleOutcome::Malformed(reason),
            _ if skipped > 0 => RuleOutcome::Skipped(format!("{} matches outside accepted range", skipped)),
            _ => RuleOutcome::Skipped("no match".to_string()),
        }
    }
}
