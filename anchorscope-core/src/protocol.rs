// Request/response shapes for one negotiation round-trip.
//
// Nothing is held between calls: the caller resubmits the site URL together
// with the step it chose and whatever payload that step needs.

use crate::analysis::AnalysisResult;
use crate::error::{AnalysisError, ErrorKind};
use crate::quota::UsageQuota;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Discover,
    #[serde(alias = "retry_sitemap")]
    ManualSitemap,
    ManualUrls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub url: String,
    #[serde(default)]
    pub step: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_urls: Option<Vec<String>>,
}

impl AnalysisRequest {
    pub fn discover(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            step: Step::Discover,
            sitemap_url: None,
            manual_urls: None,
        }
    }

    pub fn manual_sitemap(url: impl Into<String>, sitemap_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            step: Step::ManualSitemap,
            sitemap_url: Some(sitemap_url.into()),
            manual_urls: None,
        }
    }

    pub fn manual_urls(url: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            url: url.into(),
            step: Step::ManualUrls,
            sitemap_url: None,
            manual_urls: Some(urls),
        }
    }
}

/// Protocol states that need the caller to supply something before crawling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStep {
    NoSitemapFound,
    SitemapInputNeeded,
    ManualUrlsNeeded,
    UrlLimitExceeded,
}

impl NegotiationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationStep::NoSitemapFound => "no_sitemap_found",
            NegotiationStep::SitemapInputNeeded => "sitemap_input_needed",
            NegotiationStep::ManualUrlsNeeded => "manual_urls_needed",
            NegotiationStep::UrlLimitExceeded => "url_limit_exceeded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputOption {
    pub id: String,
    pub label: String,
}

impl InputOption {
    fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

pub const OPTION_MANUAL_SITEMAP: &str = "manual_sitemap";
pub const OPTION_RETRY_SITEMAP: &str = "retry_sitemap";
pub const OPTION_MANUAL_URLS: &str = "manual_urls";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputRequest {
    pub step: NegotiationStep,
    pub message: String,
    pub options: Vec<InputOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_count: Option<usize>,
}

impl UserInputRequest {
    pub fn no_sitemap_found(site: &str) -> Self {
        Self {
            step: NegotiationStep::NoSitemapFound,
            message: format!(
                "No sitemap found for {}. Provide a sitemap URL or a list of page URLs.",
                site
            ),
            options: vec![
                InputOption::new(OPTION_MANUAL_SITEMAP, "Enter sitemap URL"),
                InputOption::new(OPTION_MANUAL_URLS, "Enter URLs manually"),
            ],
            url_count: None,
        }
    }

    pub fn sitemap_input_needed(sitemap_url: Option<&str>, reason: Option<&str>) -> Self {
        let message = match (sitemap_url, reason) {
            (Some(url), Some(reason)) => {
                format!("Could not use sitemap {}: {}. Check the URL and try again.", url, reason)
            }
            _ => "Enter the URL of the site's sitemap.".to_string(),
        };
        Self {
            step: NegotiationStep::SitemapInputNeeded,
            message,
            options: vec![
                InputOption::new(OPTION_RETRY_SITEMAP, "Try another sitemap URL"),
                InputOption::new(OPTION_MANUAL_URLS, "Enter URLs manually"),
            ],
            url_count: None,
        }
    }

    pub fn manual_urls_needed() -> Self {
        Self {
            step: NegotiationStep::ManualUrlsNeeded,
            message: "Enter the page URLs to analyze, one per line.".to_string(),
            options: vec![InputOption::new(OPTION_MANUAL_URLS, "Enter URLs manually")],
            url_count: None,
        }
    }

    pub fn url_limit_exceeded(url_count: usize, max_urls: usize) -> Self {
        Self {
            step: NegotiationStep::UrlLimitExceeded,
            message: format!(
                "Found {} URLs, more than the {} a single analysis can crawl. \
                 Submit a list of at most {} URLs instead.",
                url_count, max_urls, max_urls
            ),
            options: vec![InputOption::new(OPTION_MANUAL_URLS, "Enter URLs manually")],
            url_count: Some(url_count),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub success: bool,
    pub data: AnalysisResult,
    pub remaining_requests: u32,
    pub reset_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    pub success: bool,
    pub needs_user_input: bool,
    pub step: NegotiationStep,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<InputOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_requests: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Success(SuccessResponse),
    NeedsInput(NegotiationResponse),
    Error(ErrorResponse),
}

impl AnalysisResponse {
    pub fn success(result: AnalysisResult, quota: &UsageQuota) -> Self {
        AnalysisResponse::Success(SuccessResponse {
            success: true,
            data: result,
            remaining_requests: quota.remaining_requests,
            reset_time: quota.reset_time(),
        })
    }

    pub fn needs_input(request: UserInputRequest) -> Self {
        AnalysisResponse::NeedsInput(NegotiationResponse {
            success: false,
            needs_user_input: true,
            step: request.step,
            message: request.message,
            options: (!request.options.is_empty()).then_some(request.options),
            url_count: request.url_count,
        })
    }

    /// `quota` is the caller's current quota, when it could be read.
    pub fn error(error: &AnalysisError, quota: Option<&UsageQuota>) -> Self {
        let (remaining_requests, reset_time) = match error {
            AnalysisError::QuotaExceeded { reset_at } => (Some(0), Some(reset_at.to_rfc3339())),
            _ => (
                quota.map(|q| q.remaining_requests),
                quota.map(|q| q.reset_time()),
            ),
        };

        AnalysisResponse::Error(ErrorResponse {
            success: false,
            error: error.to_string(),
            kind: error.kind(),
            remaining_requests,
            reset_time,
        })
    }

    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            AnalysisResponse::Success(_) | AnalysisResponse::NeedsInput(_) => 200,
            AnalysisResponse::Error(e) => e.kind.status_code(),
        }
    }
}
