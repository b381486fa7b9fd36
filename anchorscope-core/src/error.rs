use anchorscope_scanner::ScanError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Job-level failures. Page-level fetch problems never show up here; they are
/// recorded on the individual `CrawledPage`.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Daily request limit reached. Try again after {}", .reset_at.to_rfc3339())]
    QuotaExceeded { reset_at: DateTime<Utc> },

    #[error("Analysis timed out after {} minutes; try again with fewer pages", .deadline.as_secs() / 60)]
    JobTimeout { deadline: Duration },

    #[error("Transport error: {0}")]
    Transport(#[from] ScanError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for AnalysisError {
    fn from(e: rusqlite::Error) -> Self {
        AnalysisError::Storage(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    QuotaExceeded,
    JobTimeout,
    Transport,
    Storage,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::QuotaExceeded => 429,
            ErrorKind::JobTimeout => 504,
            ErrorKind::Transport => 502,
            ErrorKind::Storage => 500,
        }
    }
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalysisError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            AnalysisError::JobTimeout { .. } => ErrorKind::JobTimeout,
            AnalysisError::Transport(_) => ErrorKind::Transport,
            AnalysisError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// HTTP-equivalent status for the protocol response.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
