// Sitemap discovery via robots.txt and well-known locations

use crate::error::{Result, ScanError};
use crate::extract::same_site;
use crate::fetch::{PageFetcher, fetch_ok};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Paths tried after any `Sitemap:` entries in robots.txt.
pub const WELL_KNOWN_SITEMAPS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap-index.xml",
    "/wp-sitemap.xml",
];

/// Upper bound on child sitemaps followed from a single index.
pub const MAX_CHILD_SITEMAPS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of further sitemaps.
    Index(Vec<String>),
    /// `<urlset>`: page locations.
    UrlSet(Vec<String>),
}

/// A sitemap that was found and the same-site page URLs it lists.
#[derive(Debug, Clone)]
pub struct SitemapListing {
    pub sitemap_url: String,
    pub urls: Vec<String>,
}

/// Parse a `<urlset>` or `<sitemapindex>` document.
///
/// Elements are matched by local name, so namespace prefixes are ignored.
/// Only `<loc>` children of `<url>` / `<sitemap>` count; extension locations
/// such as `<image:loc>` are skipped.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut path: Vec<String> = Vec::new();
    let mut current_loc: Option<String> = None;
    let mut locs = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if root.is_none() {
                    root = Some(name.clone());
                }
                if name == "loc"
                    && matches!(path.last().map(String::as_str), Some("url" | "sitemap"))
                {
                    current_loc = Some(String::new());
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(e.local_name().as_ref()).to_string());
                }
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("loc") {
                    if let Some(loc) = current_loc.take() {
                        let loc = loc.trim();
                        if !loc.is_empty() {
                            locs.push(loc.to_string());
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(loc) = current_loc.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| ScanError::ParseError(format!("XML parse error: {err}")))?;
                    loc.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(loc) = current_loc.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ScanError::ParseError(format!("XML parse error: {e}"))),
            _ => {}
        }
    }

    match root.as_deref() {
        Some("urlset") => Ok(SitemapDocument::UrlSet(locs)),
        Some("sitemapindex") => Ok(SitemapDocument::Index(locs)),
        Some(other) => Err(ScanError::ParseError(format!(
            "not a sitemap document (root element <{other}>)"
        ))),
        None => Err(ScanError::ParseError("not a sitemap document".to_string())),
    }
}

/// `Sitemap:` directives from a robots.txt body.
pub fn robots_sitemaps(robots_txt: &str) -> Vec<String> {
    robots_txt
        .lines()
        .map(str::trim)
        .filter(|line| line.to_ascii_lowercase().starts_with("sitemap:"))
        .filter_map(|line| line.split_once(':').map(|(_, rhs)| rhs.trim().to_string()))
        .filter(|url| !url.is_empty())
        .collect()
}

/// Candidate sitemap locations for an origin, robots.txt entries first.
pub async fn sitemap_candidates<F: PageFetcher>(
    fetcher: &F,
    origin: &Url,
    timeout: Duration,
) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Ok(robots_url) = origin.join("/robots.txt") {
        match fetch_ok(fetcher, robots_url.as_str(), timeout).await {
            Ok(page) => candidates.extend(robots_sitemaps(&page.body)),
            Err(e) => debug!("No robots.txt at {}: {}", robots_url, e),
        }
    }

    for path in WELL_KNOWN_SITEMAPS {
        if let Ok(url) = origin.join(path) {
            candidates.push(url.to_string());
        }
    }

    let mut seen = HashSet::new();
    candidates.retain(|url| seen.insert(url.clone()));
    candidates
}

/// Try every candidate location and return the first sitemap listing at least one page.
///
/// `Ok(None)` means the site answered but has no usable sitemap. When no
/// candidate could even be connected to, the connection error is returned.
pub async fn discover<F: PageFetcher>(
    fetcher: &F,
    origin: &Url,
    timeout: Duration,
) -> Result<Option<SitemapListing>> {
    let mut reached = false;
    let mut connect_error = None;

    for candidate in sitemap_candidates(fetcher, origin, timeout).await {
        match load_sitemap(fetcher, &candidate, origin, timeout).await {
            Ok(urls) if !urls.is_empty() => {
                info!("Found sitemap {} with {} URLs", candidate, urls.len());
                return Ok(Some(SitemapListing {
                    sitemap_url: candidate,
                    urls,
                }));
            }
            Ok(_) => {
                reached = true;
                debug!("Sitemap {} lists no same-site pages", candidate);
            }
            Err(e) if e.is_connection_failure() => {
                debug!("Sitemap candidate {} unreachable: {}", candidate, e);
                connect_error = Some(e);
            }
            Err(e) => {
                reached = true;
                debug!("Sitemap candidate {} unusable: {}", candidate, e);
            }
        }
    }

    match connect_error {
        Some(e) if !reached => Err(e),
        _ => Ok(None),
    }
}

/// Fetch a sitemap (following one level of `<sitemapindex>`) and return its same-site page URLs.
pub async fn load_sitemap<F: PageFetcher>(
    fetcher: &F,
    sitemap_url: &str,
    origin: &Url,
    timeout: Duration,
) -> Result<Vec<String>> {
    Url::parse(sitemap_url)
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", sitemap_url, e)))?;

    let page = fetch_ok(fetcher, sitemap_url, timeout).await?;
    let document = parse_sitemap(&page.body).map_err(|e| match e {
        ScanError::ParseError(reason) => ScanError::ParseError(format!("{sitemap_url}: {reason}")),
        other => other,
    })?;
    let locations = match document {
        SitemapDocument::UrlSet(urls) => urls,
        SitemapDocument::Index(children) => {
            let mut urls = Vec::new();
            for child in children.iter().take(MAX_CHILD_SITEMAPS) {
                match fetch_ok(fetcher, child, timeout).await {
                    Ok(child_page) => {
                        match parse_sitemap(&child_page.body) {
                            Ok(SitemapDocument::UrlSet(child_urls)) => urls.extend(child_urls),
                            Ok(SitemapDocument::Index(_)) => {
                                debug!("Skipping nested sitemap index {}", child)
                            }
                            Err(e) => debug!("Skipping child sitemap {}: {}", child, e),
                        }
                    }
                    Err(e) => debug!("Skipping child sitemap {}: {}", child, e),
                }
            }
            urls
        }
    };

    Ok(same_site_urls(locations, origin))
}

fn same_site_urls(locations: Vec<String>, origin: &Url) -> Vec<String> {
    let origin_host = origin.host_str().unwrap_or_default();
    let mut seen = HashSet::new();

    locations
        .into_iter()
        .filter(|loc| {
            Url::parse(loc)
                .ok()
                .filter(|url| matches!(url.scheme(), "http" | "https"))
                .and_then(|url| url.host_str().map(|host| same_site(host, origin_host)))
                .unwrap_or(false)
        })
        .filter(|loc| seen.insert(loc.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpFetcher;
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://example.com/</loc></url>
              <url><loc> https://example.com/a?x=1&amp;y=2 </loc></url>
              <url><loc><![CDATA[https://example.com/b]]></loc></url>
            </urlset>"#;

        assert_eq!(
            parse_sitemap(xml).unwrap(),
            SitemapDocument::UrlSet(vec![
                "https://example.com/".to_string(),
                "https://example.com/a?x=1&y=2".to_string(),
                "https://example.com/b".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<sitemapindex><sitemap><loc>https://example.com/posts.xml</loc></sitemap></sitemapindex>"#;
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            SitemapDocument::Index(vec!["https://example.com/posts.xml".to_string()])
        );
    }

    #[test]
    fn test_parse_decodes_numeric_entities() {
        let xml = r#"<urlset><url><loc>https://example.com/a?x=1&#38;y=2&#x26;z=3</loc></url></urlset>"#;
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            SitemapDocument::UrlSet(vec!["https://example.com/a?x=1&y=2&z=3".to_string()])
        );
    }

    #[test]
    fn test_parse_prefixed_elements() {
        let xml = r#"<?xml version="1.0"?>
            <s:urlset xmlns:s="http://www.sitemaps.org/schemas/sitemap/0.9">
              <s:url><s:loc>https://example.com/prefixed</s:loc></s:url>
            </s:urlset>"#;
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            SitemapDocument::UrlSet(vec!["https://example.com/prefixed".to_string()])
        );
    }

    #[test]
    fn test_parse_tags_with_inner_whitespace() {
        let xml = "<urlset >\n<url >\n<loc >https://example.com/spaced</loc >\n</url >\n</urlset >";
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            SitemapDocument::UrlSet(vec!["https://example.com/spaced".to_string()])
        );
    }

    #[test]
    fn test_parse_skips_extension_locations() {
        let xml = r#"<urlset xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
              <url>
                <loc>https://example.com/gallery</loc>
                <image:image><image:loc>https://example.com/photo.jpg</image:loc></image:image>
              </url>
            </urlset>"#;
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            SitemapDocument::UrlSet(vec!["https://example.com/gallery".to_string()])
        );
    }

    #[test]
    fn test_parse_rejects_non_sitemaps() {
        assert!(parse_sitemap("<html><body>Not here</body></html>").is_err());
        assert!(parse_sitemap("").is_err());
        assert!(parse_sitemap("<urlset><url><loc>x</url></urlset>").is_err());
        assert_eq!(
            parse_sitemap("<urlset/>").unwrap(),
            SitemapDocument::UrlSet(Vec::new())
        );
    }

    #[test]
    fn test_robots_sitemaps() {
        let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://example.com/a.xml\nsitemap:https://example.com/b.xml\n";
        assert_eq!(
            robots_sitemaps(robots),
            vec!["https://example.com/a.xml", "https://example.com/b.xml"]
        );
    }

    #[tokio::test]
    async fn test_discover_reports_unreachable_origin() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let origin = Url::parse("http://127.0.0.1:1/").unwrap();

        let err = discover(&fetcher, &origin, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn test_discover_without_sitemap_is_not_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let origin = Url::parse(&mock_server.uri()).unwrap();

        let found = discover(&fetcher, &origin, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_same_site_urls_filters_and_dedups() {
        let origin = Url::parse("https://example.com/").unwrap();
        let urls = same_site_urls(
            vec![
                "https://example.com/a".to_string(),
                "https://www.example.com/b".to_string(),
                "https://cdn.other.net/c".to_string(),
                "https://example.com/a".to_string(),
                "ftp://example.com/d".to_string(),
            ],
            &origin,
        );
        assert_eq!(urls, vec!["https://example.com/a", "https://www.example.com/b"]);
    }
}
