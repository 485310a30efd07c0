//! HTML extraction for JD listing and detail pages
//!
//! The structural patterns in this module are the site's markup protocol:
//! when JD changes a page layout, the change lands here and nowhere else.
//! Extraction never fails — a pattern that does not match simply leaves the
//! corresponding field absent, and a listing without item attributes yields
//! an empty identifier list.

pub mod detail;
pub mod listing;
pub mod mobile;

pub use detail::DetailParser;
pub use listing::ListingParser;
pub use mobile::MobileParser;

use regex::Regex;

use crate::infrastructure::error::ScrapeError;

/// Compiled parser set shared by all tasks of a run.
#[derive(Debug)]
pub struct PageParsers {
    pub listing: ListingParser,
    pub detail: DetailParser,
    pub mobile: MobileParser,
}

impl PageParsers {
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            listing: ListingParser::new()?,
            detail: DetailParser::new()?,
            mobile: MobileParser::new()?,
        })
    }
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ScrapeError> {
    Regex::new(pattern).map_err(|e| ScrapeError::config(format!("pattern '{pattern}': {e}")))
}

/// Trimmed capture group 1, absent when empty.
pub(crate) fn captured_text(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .map(|caps| caps[1].trim().to_string())
        .filter(|text| !text.is_empty())
}
