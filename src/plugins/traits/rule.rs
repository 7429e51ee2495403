use rust_decimal::Decimal;
use scraper::Html;

/// A page as seen by extraction rules: the raw markup plus its parsed DOM.
pub struct Page<'a> {
    pub markup: &'a str,
    pub document: Html,
}

impl<'a> Page<'a> {
    pub fn parse(markup: &'a str) -> Self {
        Self {
            markup,
            document: Html::parse_document(markup),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// A positive, in-range price.
    Found(Decimal),
    /// The rule did not apply to this page.
    Skipped(String),
    /// The rule matched something that is not a usable price.
    Malformed(String),
}

/// Accepted price range; candidates outside it are skipped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceBounds {
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && price <= self.max
    }
}

/// One way of pulling a price out of a page (CSS selector, regex, ...).
pub trait ExtractionRule: Send + Sync {
    /// Stable identifier, reported when the rule produces a price.
    fn name(&self) -> &str;

    fn attempt(&self, page: &Page<'_>) -> RuleOutcome;
}
