//! Application layer: run orchestration and the product stream

pub mod scraper;

pub use scraper::{ProductStream, RunPhase, Scraper};
