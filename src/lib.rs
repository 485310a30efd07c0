//! jd-scout - Concurrent JD.com product scraper
//!
//! This crate turns a search keyword into a stream of structured product
//! records scraped from JD's paginated search interface and per-item detail
//! pages. It handles unreliable responses with bounded retries, paces
//! outbound load through a shared admission gate, and rotates egress
//! proxies and client identities to lower the risk of being blocked.
//!
//! Spreadsheet handling, brand mapping and result comparison live in the
//! consuming application; this crate ends at the product stream.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export the public surface for easier access
pub use application::scraper::{ProductStream, RunPhase, Scraper};
pub use domain::product::Product;
pub use infrastructure::config::ScraperConfig;
pub use infrastructure::error::{FetchError, ScrapeError};
pub use infrastructure::http::Transport;
