// Filterable, sortable view over aggregated anchors

use crate::aggregate::AnchorRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which records are shown, shared by the data table and the word cloud.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorFilter {
    pub min_count: usize,
    /// Case-insensitive substring; empty matches everything.
    pub text: String,
}

impl AnchorFilter {
    pub fn new(min_count: usize, text: impl Into<String>) -> Self {
        Self {
            min_count,
            text: text.into(),
        }
    }

    pub fn matches(&self, record: &AnchorRecord) -> bool {
        let needle = self.text.trim().to_lowercase();
        record.count >= self.min_count.max(1)
            && (needle.is_empty() || record.text.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Count,
    Text,
    Pages,
}

impl SortKey {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "count" => Some(SortKey::Count),
            "text" | "anchor" => Some(SortKey::Text),
            "pages" => Some(SortKey::Pages),
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            SortKey::Count => SortKey::Text,
            SortKey::Text => SortKey::Pages,
            SortKey::Pages => SortKey::Count,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Count => "count",
            SortKey::Text => "text",
            SortKey::Pages => "pages",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn toggle(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

pub struct AnchorTable<'a> {
    rows: Vec<&'a AnchorRecord>,
}

impl<'a> AnchorTable<'a> {
    /// Equal keys keep their input order in either direction.
    pub fn new(
        records: &'a [AnchorRecord],
        filter: &AnchorFilter,
        key: SortKey,
        direction: SortDirection,
    ) -> Self {
        let mut rows: Vec<&AnchorRecord> = records.iter().filter(|r| filter.matches(r)).collect();

        let compare = |a: &&AnchorRecord, b: &&AnchorRecord| -> Ordering {
            match key {
                SortKey::Count => a.count.cmp(&b.count),
                SortKey::Text => a.text.to_lowercase().cmp(&b.text.to_lowercase()),
                SortKey::Pages => a.page_count().cmp(&b.page_count()),
            }
        };
        match direction {
            SortDirection::Ascending => rows.sort_by(compare),
            SortDirection::Descending => rows.sort_by(|a, b| compare(b, a)),
        }

        Self { rows }
    }

    pub fn rows(&self) -> &[&'a AnchorRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Links represented by the visible rows.
    pub fn total_links(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }
}
