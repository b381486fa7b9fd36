use crate::error::{Result, ScanError};
use crate::result::AnchorOccurrence;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static BASE: LazyLock<Selector> = LazyLock::new(|| selector("base[href]"));
static BODY: LazyLock<Selector> = LazyLock::new(|| selector("body"));
static IMG_ALT: LazyLock<Selector> = LazyLock::new(|| selector("img[alt]"));
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| selector("article"));
static PRIMARY_CONTENT: LazyLock<Vec<Selector>> =
    LazyLock::new(|| ["main", "[role=main]"].into_iter().map(selector).collect());
static FALLBACK_CONTENT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["#content", "#main", ".content", ".main-content"]
        .into_iter()
        .map(selector)
        .collect()
});

/// Elements that make up page chrome rather than content.
const CHROME_TAGS: &[&str] = &["nav", "header", "footer", "aside"];
const CHROME_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "complementary"];
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector literal")
}

/// What to do with an anchor that has no text and no accessible name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyAnchorPolicy {
    /// Leave the anchor out entirely.
    #[default]
    Drop,
    /// Report it under its resolved href ("naked URL" anchors).
    UseHref,
}

/// Title and internal content anchors of a single page.
#[derive(Debug, Clone, Default)]
pub struct PageLinks {
    pub title: String,
    pub anchors: Vec<AnchorOccurrence>,
}

/// Extracts internal anchors from the main content region of a page.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    origin_host: String,
    empty_anchor_policy: EmptyAnchorPolicy,
}

impl LinkExtractor {
    pub fn new(origin: &Url) -> Result<Self> {
        let origin_host = origin
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", origin)))?
            .to_string();

        Ok(Self {
            origin_host,
            empty_anchor_policy: EmptyAnchorPolicy::Drop,
        })
    }

    pub fn with_empty_anchor_policy(mut self, policy: EmptyAnchorPolicy) -> Self {
        self.empty_anchor_policy = policy;
        self
    }

    pub fn extract(&self, html: &str, page_url: &str) -> Result<Vec<AnchorOccurrence>> {
        Ok(self.parse(html, page_url)?.anchors)
    }

    pub fn parse(&self, html: &str, page_url: &str) -> Result<PageLinks> {
        let page = Url::parse(page_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", page_url, e)))?;
        let document = Html::parse_document(html);

        let base = document
            .select(&BASE)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| page.join(href).ok())
            .unwrap_or(page);

        let title = document
            .select(&TITLE)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .unwrap_or_default();

        let root = content_root(&document);
        let mut anchors = Vec::new();

        for anchor in root.select(&ANCHOR) {
            if in_page_chrome(anchor, root) {
                continue;
            }

            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(resolved) = resolve_href(&base, href) else {
                continue;
            };
            if !resolved
                .host_str()
                .is_some_and(|host| same_site(host, &self.origin_host))
            {
                continue;
            }

            let text = match anchor_text(anchor) {
                Some(text) => text,
                None => match self.empty_anchor_policy {
                    EmptyAnchorPolicy::Drop => {
                        debug!("Dropping empty anchor to {} on {}", resolved, page_url);
                        continue;
                    }
                    EmptyAnchorPolicy::UseHref => resolved.to_string(),
                },
            };

            anchors.push(AnchorOccurrence::new(text, resolved.to_string(), page_url));
        }

        Ok(PageLinks { title, anchors })
    }
}

/// Two hosts belong to the same site if they match after dropping a leading `www.`.
pub fn same_site(host: &str, origin_host: &str) -> bool {
    fn bare(host: &str) -> &str {
        host.strip_prefix("www.").unwrap_or(host)
    }
    bare(host).eq_ignore_ascii_case(bare(origin_host))
}

/// Resolve an href against the page (or `<base>`) URL, dropping non-navigational links.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    let lowered = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || SKIPPED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

fn content_root(document: &Html) -> ElementRef<'_> {
    for selector in PRIMARY_CONTENT.iter() {
        if let Some(el) = document.select(selector).next() {
            return el;
        }
    }

    // Only a lone <article> is the page body; several are a listing.
    let mut articles = document.select(&ARTICLE);
    if let (Some(article), None) = (articles.next(), articles.next()) {
        return article;
    }

    for selector in FALLBACK_CONTENT.iter() {
        if let Some(el) = document.select(selector).next() {
            return el;
        }
    }

    document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element())
}

fn in_page_chrome(anchor: ElementRef<'_>, root: ElementRef<'_>) -> bool {
    for node in anchor.ancestors() {
        if node.id() == root.id() {
            break;
        }
        if let Some(el) = node.value().as_element() {
            if CHROME_TAGS.contains(&el.name()) {
                return true;
            }
            if el.attr("role").is_some_and(|role| CHROME_ROLES.contains(&role)) {
                return true;
            }
        }
    }
    false
}

fn anchor_text(anchor: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&anchor.text().collect::<String>());
    if !text.is_empty() {
        return Some(text);
    }

    // Fall back to the accessible name for icon and image links.
    let el = anchor.value();
    el.attr("aria-label")
        .or_else(|| el.attr("title"))
        .or_else(|| {
            anchor
                .select(&IMG_ALT)
                .find_map(|img| img.value().attr("alt"))
        })
        .map(collapse_whitespace)
        .filter(|text| !text.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> LinkExtractor {
        LinkExtractor::new(&Url::parse("https://example.com/").unwrap()).unwrap()
    }

    #[test]
    fn test_excludes_navigation_header_footer_and_aside() {
        let html = r#"<html><body>
            <header><a href="/logo">Logo</a></header>
            <nav><a href="/services">Services</a></nav>
            <div role="navigation"><a href="/menu">Menu</a></div>
            <main>
                <p>Read our <a href="/pricing">pricing guide</a>.</p>
            </main>
            <aside><a href="/sidebar">Sidebar</a></aside>
            <footer><a href="/privacy">Privacy</a></footer>
        </body></html>"#;

        let anchors = extractor()
            .extract(html, "https://example.com/blog/post")
            .unwrap();

        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].text, "pricing guide");
        assert_eq!(anchors[0].href, "https://example.com/pricing");
        assert_eq!(anchors[0].source_page, "https://example.com/blog/post");
    }

    #[test]
    fn test_resolves_relative_protocol_relative_and_absolute_hrefs() {
        let html = r#"<html><body><main>
            <a href="../contact">Relative</a>
            <a href="//example.com/team">Protocol relative</a>
            <a href="https://example.com/careers#open">Absolute</a>
            <a href="https://other.org/partner">External</a>
        </main></body></html>"#;

        let anchors = extractor()
            .extract(html, "https://example.com/about/us")
            .unwrap();
        let hrefs: Vec<&str> = anchors.iter().map(|a| a.href.as_str()).collect();

        assert_eq!(
            hrefs,
            vec![
                "https://example.com/contact",
                "https://example.com/team",
                "https://example.com/careers",
            ]
        );
    }

    #[test]
    fn test_skips_non_navigational_links() {
        let html = r##"<html><body>
            <a href="#top">Top</a>
            <a href="mailto:hi@example.com">Mail</a>
            <a href="tel:+15555555">Call</a>
            <a href="javascript:void(0)">Click</a>
            <a href="/real">Real</a>
        </body></html>"##;

        let anchors = extractor().extract(html, "https://example.com/").unwrap();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].text, "Real");
    }

    #[test]
    fn test_www_prefix_counts_as_same_site() {
        assert!(same_site("www.example.com", "example.com"));
        assert!(same_site("example.com", "www.example.com"));
        assert!(!same_site("blog.example.com", "example.com"));
    }

    #[test]
    fn test_empty_anchor_uses_accessible_name_then_policy() {
        let html = r#"<html><body><main>
            <a href="/search" aria-label="Search"><svg></svg></a>
            <a href="/home"><img src="logo.png" alt="Home page"></a>
            <a href="/naked"></a>
        </main></body></html>"#;

        let dropped = extractor().extract(html, "https://example.com/").unwrap();
        let texts: Vec<&str> = dropped.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["Search", "Home page"]);

        let kept = extractor()
            .with_empty_anchor_policy(EmptyAnchorPolicy::UseHref)
            .extract(html, "https://example.com/")
            .unwrap();
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[2].text, "https://example.com/naked");
    }

    #[test]
    fn test_collapses_whitespace_but_keeps_case() {
        let html = "<html><body><main><a href=\"/a\">\n  Learn\n   More </a></main></body></html>";
        let anchors = extractor().extract(html, "https://example.com/").unwrap();
        assert_eq!(anchors[0].text, "Learn More");
    }

    #[test]
    fn test_base_href_and_title() {
        let html = r#"<html><head><title> Docs | Example </title>
            <base href="https://example.com/docs/"></head>
            <body><a href="intro">Intro</a></body></html>"#;

        let links = extractor().parse(html, "https://example.com/").unwrap();
        assert_eq!(links.title, "Docs | Example");
        assert_eq!(links.anchors[0].href, "https://example.com/docs/intro");
    }

    #[test]
    fn test_listing_pages_with_many_articles_use_body() {
        let html = r#"<html><body>
            <article><a href="/one">One</a></article>
            <article><a href="/two">Two</a></article>
            <p><a href="/archive">Archive</a></p>
        </body></html>"#;

        let anchors = extractor().extract(html, "https://example.com/").unwrap();
        assert_eq!(anchors.len(), 3);
    }
}
