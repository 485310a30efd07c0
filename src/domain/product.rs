//! Product record produced by the scraper

use serde::{Deserialize, Serialize};

/// One item resolved from a search listing and its detail page(s).
///
/// `sku` and `detail_url` are always populated. The descriptive fields are
/// best-effort: a detail page that does not expose a brand, model or shop
/// name simply yields `None` for that field, which downstream comparison
/// treats as a legitimate value rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Opaque per-item identifier, unique within a run.
    pub sku: String,
    /// Display title; falls back to the SKU when the page has no title.
    pub title: String,
    /// Canonical desktop detail URL built from the SKU.
    #[serde(rename = "detailUrl")]
    pub detail_url: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub shop: Option<String>,
}

/// Fields extracted from the desktop detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub shop: Option<String>,
}

/// Fields extracted from the mobile detail page variant.
///
/// The mobile page carries no shop name, so the fragment is narrower than
/// [`DetailFields`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MobileFields {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}
