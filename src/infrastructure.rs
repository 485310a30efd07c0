//! Infrastructure layer: configuration, transport, rotation and parsing

pub mod config;
pub mod error;
pub mod http;
pub mod parsing;
pub mod rotation;

pub use config::ScraperConfig;
pub use error::{FetchError, ScrapeError};
pub use http::{FetchSession, ReqwestTransport, Transport};
pub use rotation::Rotation;
