use serde::{Deserialize, Serialize};

/// One observed `<a>` use on a crawled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorOccurrence {
    pub text: String,
    pub href: String,
    pub source_page: String,
}

impl AnchorOccurrence {
    pub fn new(
        text: impl Into<String>,
        href: impl Into<String>,
        source_page: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            href: href.into(),
            source_page: source_page.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawledPage {
    pub url: String,
    pub title: String,
    pub link_count: usize,
    pub status_code: u16,
    pub response_time_ms: u64,
    pub error: Option<String>,
    /// The fetch failed before any server answered.
    #[serde(default)]
    pub unreachable: bool,
}

impl CrawledPage {
    pub fn new(url: String) -> Self {
        Self {
            url,
            title: String::new(),
            link_count: 0,
            status_code: 0,
            response_time_ms: 0,
            error: None,
            unreachable: false,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            url,
            title: String::new(),
            link_count: 0,
            status_code: 0,
            response_time_ms: 0,
            error: Some(error),
            unreachable: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A crawled page together with the anchors extracted from it.
///
/// Failed pages always carry an empty occurrence list.
#[derive(Debug, Clone)]
pub struct PageScan {
    pub page: CrawledPage,
    pub occurrences: Vec<AnchorOccurrence>,
}

impl PageScan {
    pub fn failed(url: String, error: String) -> Self {
        Self {
            page: CrawledPage::with_error(url, error),
            occurrences: Vec::new(),
        }
    }
}
