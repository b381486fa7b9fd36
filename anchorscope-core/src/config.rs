use anchorscope_scanner::EmptyAnchorPolicy;
use anchorscope_scanner::fetch::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest page list a single analysis will crawl.
pub const MAX_URLS: usize = 500;
/// Analyses allowed per caller per rolling day.
pub const DAILY_QUOTA: u32 = 5;
pub const JOB_DEADLINE: Duration = Duration::from_secs(30 * 60);
pub const QUOTA_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// How anchor texts are compared when grouping occurrences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorGrouping {
    /// Group on the literal trimmed text ("Learn more" and "Learn More" stay apart).
    #[default]
    Exact,
    /// Group ignoring case; the first spelling seen is displayed.
    CaseInsensitive,
}

impl AnchorGrouping {
    pub fn key(&self, text: &str) -> String {
        match self {
            AnchorGrouping::Exact => text.to_string(),
            AnchorGrouping::CaseInsensitive => text.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub max_urls: usize,
    pub daily_quota: u32,
    pub quota_window: Duration,
    pub job_deadline: Duration,
    pub page_timeout: Duration,
    pub workers: usize,
    pub user_agent: String,
    pub top_anchor_count: usize,
    pub grouping: AnchorGrouping,
    pub empty_anchor_policy: EmptyAnchorPolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_urls: MAX_URLS,
            daily_quota: DAILY_QUOTA,
            quota_window: QUOTA_WINDOW,
            job_deadline: JOB_DEADLINE,
            page_timeout: Duration::from_secs(15),
            workers: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            top_anchor_count: 10,
            grouping: AnchorGrouping::Exact,
            empty_anchor_policy: EmptyAnchorPolicy::Drop,
        }
    }
}
