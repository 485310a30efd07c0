//! SKU extraction from search listing pages

use scraper::{Html, Selector};

use crate::infrastructure::error::ScrapeError;

/// Extracts the item identifiers advertised on a listing page.
///
/// Every listed item carries a `data-sku` attribute on its container
/// element. A page without any such attribute is a normal outcome (end of
/// pagination, or a blocked response) and produces an empty list.
#[derive(Debug)]
pub struct ListingParser {
    sku_selector: Selector,
}

impl ListingParser {
    pub fn new() -> Result<Self, ScrapeError> {
        let sku_selector = Selector::parse("[data-sku]")
            .map_err(|e| ScrapeError::config(format!("listing selector: {e}")))?;
        Ok(Self { sku_selector })
    }

    /// SKUs in document order; duplicates are kept and left to the consumer.
    pub fn parse(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.sku_selector)
            .filter_map(|element| element.value().attr("data-sku"))
            .filter(|sku| !sku.is_empty())
            .map(str::to_string)
            .collect()
    }
}
