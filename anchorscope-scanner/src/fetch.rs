use crate::error::{Result, ScanError};
use reqwest::Client;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str =
    "Anchorscope/0.1 (+https://github.com/anchorscope/anchorscope)";

/// Raw response body and the metadata the crawler cares about.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub response_time: Duration,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        // Servers that omit the header are assumed to be serving HTML.
        self.content_type
            .as_ref()
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(true)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// The network layer: turns a URL into raw text or a transport error.
pub trait PageFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage>> + Send;
}

/// `PageFetcher` backed by a pooled reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_user_agent(timeout, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50) // Connection pooling
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_connect() {
                ScanError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            } else {
                ScanError::HttpError(e)
            }
        })?;
        let response_time = start.elapsed();

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let final_url = response.url().to_string();

        let body = response.text().await?;

        Ok(FetchedPage {
            url: final_url,
            status_code,
            content_type,
            body,
            response_time,
        })
    }
}

/// Fetch `url` and fail unless the server answered 2xx within `timeout`.
pub async fn fetch_ok<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    timeout: Duration,
) -> Result<FetchedPage> {
    let page = tokio::time::timeout(timeout, fetcher.fetch(url))
        .await
        .map_err(|_| ScanError::Timeout {
            url: url.to_string(),
            after: timeout,
        })??;

    if !page.is_success() {
        return Err(ScanError::Status {
            url: url.to_string(),
            status: page.status_code,
        });
    }

    Ok(page)
}
