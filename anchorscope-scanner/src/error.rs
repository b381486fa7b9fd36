use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out after {}s fetching {url}", .after.as_secs())]
    Timeout { url: String, after: Duration },

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ScanError {
    /// The request never reached a server (refused, DNS failure, unroutable).
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ScanError::Connect { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
