//! Run configuration for the scraper
//!
//! A [`ScraperConfig`] is built once per run and never mutated while the run
//! is in flight. Misconfiguration is the only condition that aborts a run
//! before it starts; per-request failures never do.

use std::time::Duration;

use crate::infrastructure::error::ScrapeError;

/// Default values for [`ScraperConfig`].
pub mod defaults {
    use std::time::Duration;

    pub const MAX_PAGES: u32 = 10;
    pub const PAGE_SIZE: u32 = 30;
    pub const MAX_TASKS: usize = 5;
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    /// Total attempts per request, first try included.
    pub const MAX_RETRY_ATTEMPTS: u32 = 3;
    pub const BASE_DELAY: Duration = Duration::from_millis(1000);
    pub const JITTER: Duration = Duration::from_millis(300);
    /// Buffered results between the detail tasks and the consumer.
    pub const RESULT_BUFFER: usize = 64;
}

/// Immutable parameters of one scrape run.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Search keyword submitted to the listing endpoint.
    pub keyword: String,
    /// Number of listing pages fetched, starting at page 1.
    pub max_pages: u32,
    /// Items per listing page, used to derive the `s` query offset.
    pub page_size: u32,
    /// Size of the admission gate: requests in flight across all tasks.
    pub max_tasks: usize,
    pub request_timeout: Duration,
    /// Total attempts per request before it is reported exhausted.
    pub max_retry_attempts: u32,
    /// Ordered egress proxy addresses; empty means direct connections only.
    pub proxy_pool: Vec<String>,
    /// Pacing delay applied before the first attempt of every request.
    pub base_delay: Duration,
    /// Uniform noise applied to `base_delay`, floored at zero.
    pub jitter: Duration,
}

impl ScraperConfig {
    /// Create a configuration for `keyword` with default run parameters.
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            max_pages: defaults::MAX_PAGES,
            page_size: defaults::PAGE_SIZE,
            max_tasks: defaults::MAX_TASKS,
            request_timeout: defaults::REQUEST_TIMEOUT,
            max_retry_attempts: defaults::MAX_RETRY_ATTEMPTS,
            proxy_pool: Vec::new(),
            base_delay: defaults::BASE_DELAY,
            jitter: defaults::JITTER,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    pub fn with_proxy_pool(mut self, pool: Vec<String>) -> Self {
        self.proxy_pool = pool;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Reject parameter combinations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.keyword.trim().is_empty() {
            return Err(ScrapeError::config("keyword must not be empty"));
        }
        if self.max_pages == 0 {
            return Err(ScrapeError::config("max_pages must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(ScrapeError::config("page_size must be at least 1"));
        }
        if self.max_tasks == 0 {
            return Err(ScrapeError::config("max_tasks must be at least 1"));
        }
        if self.max_retry_attempts == 0 {
            return Err(ScrapeError::config("max_retry_attempts must be at least 1"));
        }
        Ok(())
    }
}
