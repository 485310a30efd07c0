//! Error taxonomy for the scraping pipeline
//!
//! [`FetchError`] covers a single failed transfer and is recovered locally
//! by the retry controller. [`ScrapeError`] covers the conditions that reach
//! the caller: a request whose retries are exhausted (dropped by the owning
//! task, never fatal to the run) and misconfiguration (fatal before the run
//! starts). Missing page fields are not errors at all; parsers express them
//! as absent options.

use thiserror::Error;
use url::Url;

/// One failed transfer attempt.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// Classify a reqwest transfer error.
    pub(crate) fn from_request(url: &Url, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Connection {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Failure surfaced beyond the retry controller.
#[derive(Error, Debug, Clone)]
pub enum ScrapeError {
    /// All attempts for one request failed; the owning task drops the
    /// affected page or item and the run continues.
    #[error("failed to fetch {url} after {attempts} attempts")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    /// Invalid run parameters; the only condition that aborts a whole run.
    #[error("invalid scraper configuration: {message}")]
    Config { message: String },
}

impl ScrapeError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
