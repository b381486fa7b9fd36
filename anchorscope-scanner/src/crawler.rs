use crate::error::{Result, ScanError};
use crate::extract::LinkExtractor;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::result::{CrawledPage, PageScan};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Called after each page with the number of pages finished so far and the page URL.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetches a fixed list of pages with bounded concurrency and extracts their anchors.
///
/// Every page is attempted independently: a timeout or error on one page is
/// recorded on that page's [`CrawledPage`] and never aborts the others.
/// Dropping the future returned by [`Crawler::crawl`] cancels all in-flight
/// and pending fetches.
pub struct Crawler<F: PageFetcher = HttpFetcher> {
    fetcher: Arc<F>,
    extractor: LinkExtractor,
    page_timeout: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler<HttpFetcher> {
    pub fn with_timeout(origin: &Url, page_timeout: Duration) -> Result<Self> {
        let fetcher = HttpFetcher::new(page_timeout)?;
        Ok(Self::with_fetcher(Arc::new(fetcher), LinkExtractor::new(origin)?)
            .with_page_timeout(page_timeout))
    }
}

impl<F: PageFetcher> Crawler<F> {
    pub fn with_fetcher(fetcher: Arc<F>, extractor: LinkExtractor) -> Self {
        Self {
            fetcher,
            extractor,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            progress_callback: None,
        }
    }

    pub fn with_page_timeout(mut self, page_timeout: Duration) -> Self {
        self.page_timeout = page_timeout;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Scan every URL in `urls`, at most `workers` at a time.
    ///
    /// Results come back in the order of `urls`.
    pub async fn crawl(&self, urls: &[String], workers: usize) -> Vec<PageScan> {
        let workers = workers.max(1);
        info!("Crawling {} pages with {} workers", urls.len(), workers);

        let completed = AtomicUsize::new(0);
        let completed = &completed;

        let mut scans: Vec<(usize, PageScan)> = stream::iter(urls.iter().enumerate())
            .map(|(idx, url)| async move {
                let scan = self.scan_page(url).await;

                if let Some(ref error) = scan.page.error {
                    warn!("Page {} failed: {}", url, error);
                }

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref callback) = self.progress_callback {
                    callback(done, url.clone());
                }

                (idx, scan)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        scans.sort_by_key(|(idx, _)| *idx);

        let failed = scans.iter().filter(|(_, s)| !s.page.is_success()).count();
        info!(
            "Crawl complete. {} pages attempted, {} failed",
            scans.len(),
            failed
        );

        scans.into_iter().map(|(_, scan)| scan).collect()
    }

    /// Fetch and parse a single page. Never fails; problems land in `page.error`.
    pub async fn scan_page(&self, url: &str) -> PageScan {
        let fetched = match tokio::time::timeout(self.page_timeout, self.fetcher.fetch(url)).await
        {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                let mut scan = PageScan::failed(url.to_string(), e.to_string());
                scan.page.unreachable = e.is_connection_failure();
                return scan;
            }
            Err(_) => {
                let timeout = ScanError::Timeout {
                    url: url.to_string(),
                    after: self.page_timeout,
                };
                return PageScan::failed(url.to_string(), timeout.to_string());
            }
        };

        let mut page = CrawledPage::new(url.to_string());
        page.status_code = fetched.status_code;
        page.response_time_ms = fetched.response_time.as_millis() as u64;

        if !fetched.is_success() {
            page.error = Some(format!("HTTP {}", fetched.status_code));
            return PageScan {
                page,
                occurrences: Vec::new(),
            };
        }

        if !fetched.is_html() {
            page.error = Some(format!(
                "Not an HTML page ({})",
                fetched.content_type.as_deref().unwrap_or("unknown")
            ));
            return PageScan {
                page,
                occurrences: Vec::new(),
            };
        }

        match self.extractor.parse(&fetched.body, url) {
            Ok(links) => {
                debug!("{}: {} internal anchors", url, links.anchors.len());
                page.title = links.title;
                page.link_count = links.anchors.len();
                PageScan {
                    page,
                    occurrences: links.anchors,
                }
            }
            Err(e) => PageScan::failed(url.to_string(), e.to_string()),
        }
    }
}
