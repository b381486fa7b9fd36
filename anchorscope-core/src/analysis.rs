use crate::aggregate::{AnalysisInsights, AnchorAggregator, AnchorRecord};
use crate::config::AnchorGrouping;
use anchorscope_scanner::{CrawledPage, PageScan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the crawled page list came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageSource {
    DiscoveredSitemap { sitemap_url: String },
    ManualSitemap { sitemap_url: String },
    ManualUrls,
}

/// The finished, immutable outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub base_url: String,
    pub source: PageSource,
    pub completed_at: DateTime<Utc>,
    /// Sorted by count descending, ties in first-encountered order.
    pub anchors: Vec<AnchorRecord>,
    pub insights: AnalysisInsights,
    pub crawled_pages: Vec<CrawledPage>,
    pub pages_with_no_links: Vec<String>,
}

impl AnalysisResult {
    pub fn build(
        base_url: &str,
        source: PageSource,
        scans: Vec<PageScan>,
        grouping: AnchorGrouping,
        top_n: usize,
    ) -> Self {
        let mut aggregator = AnchorAggregator::new(grouping);
        let mut crawled_pages = Vec::with_capacity(scans.len());
        let mut pages_with_no_links = Vec::new();

        for scan in scans {
            if scan.page.is_success() {
                aggregator.extend(&scan.occurrences);
                if scan.page.link_count == 0 {
                    pages_with_no_links.push(scan.page.url.clone());
                }
            }
            crawled_pages.push(scan.page);
        }

        let successful_pages = crawled_pages.iter().filter(|p| p.is_success()).count();
        let mut anchors = aggregator.finish();
        let insights = AnalysisInsights::compute(&anchors, successful_pages, top_n);
        anchors.sort_by(|a, b| b.count.cmp(&a.count));

        Self {
            base_url: base_url.to_string(),
            source,
            completed_at: Utc::now(),
            anchors,
            insights,
            crawled_pages,
            pages_with_no_links,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.crawled_pages.len()
    }

    pub fn successful_pages(&self) -> usize {
        self.crawled_pages.iter().filter(|p| p.is_success()).count()
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &CrawledPage> {
        self.crawled_pages.iter().filter(|p| !p.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorscope_scanner::AnchorOccurrence;

    fn scan(url: &str, anchors: &[(&str, &str)]) -> PageScan {
        let mut page = CrawledPage::new(url.to_string());
        page.link_count = anchors.len();
        PageScan {
            page,
            occurrences: anchors
                .iter()
                .map(|(text, href)| AnchorOccurrence::new(*text, *href, url))
                .collect(),
        }
    }

    #[test]
    fn test_learn_more_scenario() {
        let scans = vec![
            scan(
                "https://a.test/",
                &[
                    ("Home", "https://a.test/"),
                    ("Home", "https://a.test/"),
                    ("Learn More", "https://a.test/about"),
                ],
            ),
            scan("https://b.test/", &[("Learn More", "https://b.test/about")]),
        ];

        let result = AnalysisResult::build(
            "https://a.test/",
            PageSource::ManualUrls,
            scans,
            AnchorGrouping::Exact,
            10,
        );

        assert_eq!(result.anchors.len(), 2);
        let home = result.anchors.iter().find(|r| r.text == "Home").unwrap();
        assert_eq!(home.count, 2);
        assert_eq!(home.destinations.len(), 1);

        let learn_more = result.anchors.iter().find(|r| r.text == "Learn More").unwrap();
        assert_eq!(learn_more.count, 2);
        assert_eq!(learn_more.destinations.len(), 2);
        assert_eq!(learn_more.destinations[0].href, "https://a.test/about");
        assert_eq!(learn_more.destinations[1].href, "https://b.test/about");
        assert!(learn_more.destinations.iter().all(|d| d.count == 1));
    }

    #[test]
    fn test_failed_pages_do_not_contribute() {
        let mut failed = scan("https://a.test/broken", &[("Ghost", "https://a.test/x")]);
        failed.page.error = Some("HTTP 500".to_string());

        let scans = vec![
            scan("https://a.test/", &[("Docs", "https://a.test/docs")]),
            failed,
            scan("https://a.test/empty", &[]),
        ];

        let result = AnalysisResult::build(
            "https://a.test/",
            PageSource::ManualUrls,
            scans,
            AnchorGrouping::Exact,
            10,
        );

        assert_eq!(result.total_pages(), 3);
        assert_eq!(result.successful_pages(), 2);
        assert_eq!(result.anchors.len(), 1);
        assert_eq!(result.pages_with_no_links, vec!["https://a.test/empty"]);
        assert_eq!(result.insights.average_links_per_page, 0.5);
        assert_eq!(result.failed_pages().count(), 1);
    }

    #[test]
    fn test_anchors_sorted_by_count() {
        let scans = vec![scan(
            "https://a.test/",
            &[
                ("Once", "https://a.test/1"),
                ("Twice", "https://a.test/2"),
                ("Twice", "https://a.test/2"),
            ],
        )];
        let result = AnalysisResult::build(
            "https://a.test/",
            PageSource::ManualUrls,
            scans,
            AnchorGrouping::Exact,
            10,
        );
        assert_eq!(result.anchors[0].text, "Twice");
        assert_eq!(result.anchors[1].text, "Once");
    }
}
