// Anchor text aggregation and the insights derived from it

use crate::config::AnchorGrouping;
use anchorscope_scanner::AnchorOccurrence;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One distinct link target used under an anchor text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub href: String,
    pub count: usize,
}

/// All occurrences sharing one anchor text.
///
/// `count` always equals the sum of the destination counts, and `pages`
/// holds each source page once, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub text: String,
    pub hrefs: Vec<String>,
    pub count: usize,
    pub pages: Vec<String>,
    pub destinations: Vec<Destination>,
}

impl AnchorRecord {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            hrefs: Vec::new(),
            count: 0,
            pages: Vec::new(),
            destinations: Vec::new(),
        }
    }

    fn record(&mut self, occurrence: &AnchorOccurrence) {
        self.count += 1;

        match self
            .destinations
            .iter_mut()
            .find(|d| d.href == occurrence.href)
        {
            Some(destination) => destination.count += 1,
            None => {
                self.destinations.push(Destination {
                    href: occurrence.href.clone(),
                    count: 1,
                });
                self.hrefs.push(occurrence.href.clone());
            }
        }

        if !self.pages.contains(&occurrence.source_page) {
            self.pages.push(occurrence.source_page.clone());
        }
    }

    /// Distinct destinations joined for display.
    pub fn joined_hrefs(&self) -> String {
        self.hrefs.join(", ")
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Groups anchor occurrences by text, merging destinations per text.
#[derive(Debug, Default)]
pub struct AnchorAggregator {
    grouping: AnchorGrouping,
    records: Vec<AnchorRecord>,
    index: HashMap<String, usize>,
}

impl AnchorAggregator {
    pub fn new(grouping: AnchorGrouping) -> Self {
        Self {
            grouping,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn add(&mut self, occurrence: &AnchorOccurrence) {
        let text = occurrence.text.trim();
        if text.is_empty() {
            return;
        }

        let key = self.grouping.key(text);
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.records.push(AnchorRecord::new(text));
                self.index.insert(key, self.records.len() - 1);
                self.records.len() - 1
            }
        };
        self.records[idx].record(occurrence);
    }

    pub fn extend<'a>(&mut self, occurrences: impl IntoIterator<Item = &'a AnchorOccurrence>) {
        for occurrence in occurrences {
            self.add(occurrence);
        }
    }

    /// Records in first-encountered order.
    pub fn finish(self) -> Vec<AnchorRecord> {
        self.records
    }
}

/// Group occurrences on their exact trimmed text.
pub fn aggregate(occurrences: &[AnchorOccurrence]) -> Vec<AnchorRecord> {
    let mut aggregator = AnchorAggregator::new(AnchorGrouping::Exact);
    aggregator.extend(occurrences);
    aggregator.finish()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSummary {
    pub text: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInsights {
    pub total_unique_anchors: usize,
    pub total_internal_links: usize,
    pub average_links_per_page: f64,
    pub most_frequent_anchor: Option<AnchorSummary>,
    pub single_usage_anchors: usize,
    pub top_anchors: Vec<AnchorSummary>,
}

impl AnalysisInsights {
    /// `records` must be in first-encountered order for tie-breaking.
    pub fn compute(records: &[AnchorRecord], successful_pages: usize, top_n: usize) -> Self {
        let total_internal_links: usize = records.iter().map(|r| r.count).sum();

        let average_links_per_page = if successful_pages == 0 {
            0.0
        } else {
            total_internal_links as f64 / successful_pages as f64
        };

        // Strictly greater keeps the earliest record on ties.
        let mut most_frequent: Option<&AnchorRecord> = None;
        for record in records {
            if most_frequent.is_none_or(|best| record.count > best.count) {
                most_frequent = Some(record);
            }
        }

        let mut ranked: Vec<&AnchorRecord> = records.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));

        Self {
            total_unique_anchors: records.len(),
            total_internal_links,
            average_links_per_page,
            most_frequent_anchor: most_frequent.map(summary),
            single_usage_anchors: records.iter().filter(|r| r.count == 1).count(),
            top_anchors: ranked.into_iter().take(top_n).map(summary).collect(),
        }
    }
}

fn summary(record: &AnchorRecord) -> AnchorSummary {
    AnchorSummary {
        text: record.text.clone(),
        count: record.count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(text: &str, href: &str, page: &str) -> AnchorOccurrence {
        AnchorOccurrence::new(text, href, page)
    }

    #[test]
    fn test_many_to_many_merge() {
        let mut occurrences = Vec::new();
        for _ in 0..3 {
            occurrences.push(occ("Pricing", "https://a.test/pricing", "https://a.test/1"));
        }
        for _ in 0..2 {
            occurrences.push(occ("Pricing", "https://a.test/plans", "https://a.test/2"));
        }

        let records = aggregate(&occurrences);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.count, 5);
        assert_eq!(
            record.destinations,
            vec![
                Destination { href: "https://a.test/pricing".into(), count: 3 },
                Destination { href: "https://a.test/plans".into(), count: 2 },
            ]
        );
        assert_eq!(record.hrefs, vec!["https://a.test/pricing", "https://a.test/plans"]);
        assert_eq!(record.joined_hrefs(), "https://a.test/pricing, https://a.test/plans");
    }

    #[test]
    fn test_pages_are_deduplicated() {
        let occurrences = vec![
            occ("Contact", "https://a.test/contact", "https://a.test/"),
            occ("Contact", "https://a.test/contact", "https://a.test/"),
        ];
        let records = aggregate(&occurrences);

        assert_eq!(records[0].count, 2);
        assert_eq!(records[0].pages, vec!["https://a.test/"]);
    }

    #[test]
    fn test_exact_grouping_keeps_case_variants_apart() {
        let occurrences = vec![
            occ("Learn more", "https://a.test/x", "https://a.test/"),
            occ("Learn More", "https://a.test/x", "https://a.test/"),
        ];
        assert_eq!(aggregate(&occurrences).len(), 2);

        let mut folded = AnchorAggregator::new(AnchorGrouping::CaseInsensitive);
        folded.extend(&occurrences);
        let records = folded.finish();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "Learn more");
        assert_eq!(records[0].count, 2);
    }

    #[test]
    fn test_empty_text_is_ignored() {
        let occurrences = vec![occ("   ", "https://a.test/x", "https://a.test/")];
        assert!(aggregate(&occurrences).is_empty());
    }

    #[test]
    fn test_insights() {
        let occurrences = vec![
            occ("Home", "https://a.test/", "https://a.test/1"),
            occ("Blog", "https://a.test/blog", "https://a.test/1"),
            occ("Blog", "https://a.test/blog", "https://a.test/2"),
            occ("Home", "https://a.test/", "https://a.test/2"),
            occ("Careers", "https://a.test/jobs", "https://a.test/2"),
        ];
        let records = aggregate(&occurrences);
        let insights = AnalysisInsights::compute(&records, 2, 2);

        assert_eq!(insights.total_unique_anchors, 3);
        assert_eq!(insights.total_internal_links, 5);
        assert!((insights.average_links_per_page - 2.5).abs() < f64::EPSILON);
        // Home and Blog tie at 2; Home was seen first.
        assert_eq!(insights.most_frequent_anchor.unwrap().text, "Home");
        assert_eq!(insights.single_usage_anchors, 1);
        assert_eq!(
            insights.top_anchors.iter().map(|a| a.text.as_str()).collect::<Vec<_>>(),
            vec!["Home", "Blog"]
        );
    }

    #[test]
    fn test_insights_without_successful_pages() {
        let insights = AnalysisInsights::compute(&[], 0, 10);
        assert_eq!(insights.average_links_per_page, 0.0);
        assert!(insights.most_frequent_anchor.is_none());
        assert!(insights.top_anchors.is_empty());
    }
}
