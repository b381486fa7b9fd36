use crate::analysis::{AnalysisResult, PageSource};
use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Result};
use crate::protocol::{AnalysisRequest, AnalysisResponse, Step, UserInputRequest};
use crate::quota::{QuotaGate, QuotaStore, UsageQuota};
use anchorscope_scanner::sitemap;
use anchorscope_scanner::{
    Crawler, HttpFetcher, LinkExtractor, PageFetcher, ProgressCallback, ScanError, same_site,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Where the page list for a run comes from, after the request was validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    Discover,
    ManualSitemap(String),
    ManualUrls(Vec<String>),
}

/// What a call to the analyzer produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    Completed {
        result: Box<AnalysisResult>,
        quota: UsageQuota,
    },
    NeedsInput(UserInputRequest),
}

enum Negotiated {
    Done(AnalysisResult),
    NeedsInput(UserInputRequest),
}

/// Parse a user-supplied URL, adding `https://` when the scheme is missing.
pub fn parse_url_line(line: &str) -> Option<Url> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let web_url = |url: Url| {
        (matches!(url.scheme(), "http" | "https") && url.host_str().is_some()).then_some(url)
    };

    if line.contains("://") {
        return Url::parse(line).ok().and_then(web_url);
    }
    if let Some(url) = Url::parse(line).ok().and_then(web_url) {
        return Some(url);
    }
    Url::parse(&format!("https://{}", line)).ok().and_then(web_url)
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

pub fn validate_site_url(input: &str) -> Result<Url> {
    if input.trim().is_empty() {
        return Err(AnalysisError::InvalidInput("A site URL is required".to_string()));
    }
    parse_url_line(input).ok_or_else(|| {
        AnalysisError::InvalidInput(format!("'{}' is not a valid http(s) URL", input.trim()))
    })
}

/// Normalize a hand-entered page list: blanks and comment lines are skipped,
/// off-site and unparseable entries dropped, duplicates removed.
pub fn prepare_manual_urls(origin: &Url, lines: &[String]) -> Result<Vec<String>> {
    let origin_host = origin.host_str().unwrap_or_default();
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(mut url) = parse_url_line(line) else {
            warn!("Skipping invalid URL '{}'", line);
            continue;
        };
        if !url.host_str().is_some_and(|host| same_site(host, origin_host)) {
            warn!("Skipping {}: not on {}", url, origin_host);
            continue;
        }
        url.set_fragment(None);
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }

    if urls.is_empty() {
        return Err(AnalysisError::InvalidInput(format!(
            "No valid URLs on {} were provided",
            origin_host
        )));
    }
    Ok(urls)
}

/// Drives one analysis from a request to a result or a negotiation prompt.
///
/// Calls are independent: each one re-validates, reserves from the caller's
/// quota and runs under its own job deadline.
pub struct Analyzer<F: PageFetcher, S: QuotaStore> {
    fetcher: Arc<F>,
    quota: QuotaGate<S>,
    config: AnalyzerConfig,
    progress_callback: Option<ProgressCallback>,
}

impl<S: QuotaStore> Analyzer<HttpFetcher, S> {
    pub fn with_http(store: S, config: AnalyzerConfig) -> Result<Self> {
        let fetcher = HttpFetcher::with_user_agent(config.page_timeout, &config.user_agent)?;
        Ok(Self::new(Arc::new(fetcher), store, config))
    }
}

impl<F: PageFetcher, S: QuotaStore> Analyzer<F, S> {
    pub fn new(fetcher: Arc<F>, store: S, config: AnalyzerConfig) -> Self {
        let quota = QuotaGate::new(store, config.daily_quota, config.quota_window);
        Self {
            fetcher,
            quota,
            config,
            progress_callback: None,
        }
    }

    /// Called once per page crawled with (pages done, page URL).
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn quota(&self) -> &QuotaGate<S> {
        &self.quota
    }

    /// Begin an analysis by looking for the site's sitemap.
    pub async fn start(&self, caller: &str, url: &str) -> Result<Outcome> {
        self.resume(caller, &AnalysisRequest::discover(url)).await
    }

    /// Continue (or begin) an analysis at the step the caller chose.
    ///
    /// One request is reserved from the caller's quota before any fetch. It is
    /// handed back when the call ends in a prompt or invalid input.
    pub async fn resume(&self, caller: &str, request: &AnalysisRequest) -> Result<Outcome> {
        let origin = validate_site_url(&request.url)?;
        let pages = self.page_request(&origin, request)?;

        self.quota.reserve(caller, Utc::now())?;

        let Some(pages) = pages else {
            self.quota.refund(caller, Utc::now())?;
            return Ok(Outcome::NeedsInput(match request.step {
                Step::ManualSitemap => UserInputRequest::sitemap_input_needed(None, None),
                _ => UserInputRequest::manual_urls_needed(),
            }));
        };

        info!("Analyzing {} ({:?})", origin, request.step);

        let deadline = self.config.job_deadline;
        let outcome = tokio::time::timeout(deadline, self.negotiate(&origin, pages)).await;

        match outcome {
            Ok(Ok(Negotiated::NeedsInput(prompt))) => {
                debug!("Needs input from {}: {}", caller, prompt.step.as_str());
                self.quota.refund(caller, Utc::now())?;
                Ok(Outcome::NeedsInput(prompt))
            }
            Ok(Ok(Negotiated::Done(result))) => {
                let quota = self.quota.current(caller, Utc::now())?;
                info!(
                    "Analysis of {} finished: {} pages, {} unique anchors",
                    origin,
                    result.total_pages(),
                    result.insights.total_unique_anchors
                );
                Ok(Outcome::Completed {
                    result: Box::new(result),
                    quota,
                })
            }
            Ok(Err(e)) => {
                warn!("Analysis of {} failed: {}", origin, e);
                if matches!(e, AnalysisError::InvalidInput(_)) {
                    self.quota.refund(caller, Utc::now())?;
                }
                Err(e)
            }
            Err(_) => {
                warn!("Analysis of {} exceeded {:?}; cancelled", origin, deadline);
                Err(AnalysisError::JobTimeout { deadline })
            }
        }
    }

    /// Run a request and fold the outcome into a protocol response.
    pub async fn handle(&self, caller: &str, request: &AnalysisRequest) -> AnalysisResponse {
        match self.resume(caller, request).await {
            Ok(Outcome::Completed { result, quota }) => AnalysisResponse::success(*result, &quota),
            Ok(Outcome::NeedsInput(prompt)) => AnalysisResponse::needs_input(prompt),
            Err(e) => {
                let quota = self.quota.current(caller, Utc::now()).ok();
                AnalysisResponse::error(&e, quota.as_ref())
            }
        }
    }

    /// `None` when the chosen step is missing its payload.
    fn page_request(&self, origin: &Url, request: &AnalysisRequest) -> Result<Option<PageRequest>> {
        match request.step {
            Step::Discover => Ok(Some(PageRequest::Discover)),
            Step::ManualSitemap => Ok(request
                .sitemap_url
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| PageRequest::ManualSitemap(s.to_string()))),
            Step::ManualUrls => match &request.manual_urls {
                None => Ok(None),
                Some(lines) => prepare_manual_urls(origin, lines).map(|u| Some(PageRequest::ManualUrls(u))),
            },
        }
    }

    async fn negotiate(&self, origin: &Url, pages: PageRequest) -> Result<Negotiated> {
        let timeout = self.config.page_timeout;

        let (source, urls) = match pages {
            PageRequest::Discover => match sitemap::discover(&*self.fetcher, origin, timeout).await? {
                Some(listing) => (
                    PageSource::DiscoveredSitemap {
                        sitemap_url: listing.sitemap_url,
                    },
                    listing.urls,
                ),
                None => {
                    info!("No sitemap found for {}", origin);
                    return Ok(Negotiated::NeedsInput(UserInputRequest::no_sitemap_found(
                        origin.as_str(),
                    )));
                }
            },
            PageRequest::ManualSitemap(sitemap_url) => {
                let sitemap_url = parse_url_line(&sitemap_url)
                    .map(|u| u.to_string())
                    .unwrap_or(sitemap_url);
                match sitemap::load_sitemap(&*self.fetcher, &sitemap_url, origin, timeout).await {
                    Ok(urls) if !urls.is_empty() => {
                        (PageSource::ManualSitemap { sitemap_url }, urls)
                    }
                    Ok(_) => {
                        return Ok(Negotiated::NeedsInput(UserInputRequest::sitemap_input_needed(
                            Some(&sitemap_url),
                            Some("it lists no pages on this site"),
                        )));
                    }
                    Err(e) => {
                        return Ok(Negotiated::NeedsInput(UserInputRequest::sitemap_input_needed(
                            Some(&sitemap_url),
                            Some(&e.to_string()),
                        )));
                    }
                }
            }
            PageRequest::ManualUrls(urls) => (PageSource::ManualUrls, urls),
        };

        if urls.len() > self.config.max_urls {
            info!("{} URLs exceeds the limit of {}", urls.len(), self.config.max_urls);
            return Ok(Negotiated::NeedsInput(UserInputRequest::url_limit_exceeded(
                urls.len(),
                self.config.max_urls,
            )));
        }

        let extractor =
            LinkExtractor::new(origin)?.with_empty_anchor_policy(self.config.empty_anchor_policy);
        let mut crawler = Crawler::with_fetcher(self.fetcher.clone(), extractor)
            .with_page_timeout(self.config.page_timeout);
        if let Some(ref callback) = self.progress_callback {
            crawler = crawler.with_progress_callback(callback.clone());
        }

        let scans = crawler.crawl(&urls, self.config.workers).await;
        if !scans.is_empty() && scans.iter().all(|scan| scan.page.unreachable) {
            return Err(AnalysisError::Transport(ScanError::Connect {
                url: origin.to_string(),
                reason: format!("none of the {} pages could be reached", scans.len()),
            }));
        }

        Ok(Negotiated::Done(AnalysisResult::build(
            origin.as_str(),
            source,
            scans,
            self.config.grouping,
            self.config.top_anchor_count,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_line() {
        assert_eq!(
            parse_url_line("example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(
            parse_url_line("  http://example.com/a  ").unwrap().as_str(),
            "http://example.com/a"
        );
        assert_eq!(
            parse_url_line("localhost:8080").unwrap().as_str(),
            "https://localhost:8080/"
        );
        assert!(parse_url_line("").is_none());
        assert!(parse_url_line("ftp://example.com").is_none());
        assert!(parse_url_line("not a url").is_none());
    }

    #[test]
    fn test_validate_site_url_rejects_garbage() {
        assert!(matches!(
            validate_site_url("   "),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_site_url("http://"),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(validate_site_url("https://example.com").is_ok());
    }

    #[test]
    fn test_prepare_manual_urls() {
        let origin = Url::parse("https://example.com/").unwrap();
        let lines = vec![
            "https://example.com/a".to_string(),
            "".to_string(),
            "# comment".to_string(),
            "https://example.com/a#section".to_string(),
            "www.example.com/b".to_string(),
            "https://other.com/c".to_string(),
            "::::".to_string(),
        ];
        let urls = prepare_manual_urls(&origin, &lines).unwrap();
        assert_eq!(
            urls,
            vec!["https://example.com/a", "https://www.example.com/b"]
        );
    }

    #[test]
    fn test_prepare_manual_urls_empty() {
        let origin = Url::parse("https://example.com/").unwrap();
        assert!(prepare_manual_urls(&origin, &[]).is_err());
        assert!(prepare_manual_urls(&origin, &["  ".to_string()]).is_err());
    }

    #[test]
    fn test_extract_url_path() {
        assert_eq!(extract_url_path("https://example.com"), "/");
        assert_eq!(extract_url_path("https://example.com/docs/a"), "/docs/a");
        assert_eq!(extract_url_path("garbage"), "garbage");
    }
}
