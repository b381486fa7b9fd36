// Report generation for completed analyses

use crate::analysis::{AnalysisResult, PageSource};
use crate::crawl::extract_url_path;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Markdown => "md",
        }
    }
}

pub fn generate_report(
    result: &AnalysisResult,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(result)),
        ReportFormat::Json => generate_json_report(result),
        ReportFormat::Csv => Ok(generate_csv_report(result)),
        ReportFormat::Markdown => Ok(generate_markdown_report(result)),
    }
}

fn describe_source(source: &PageSource) -> String {
    match source {
        PageSource::DiscoveredSitemap { sitemap_url } => format!("sitemap {}", sitemap_url),
        PageSource::ManualSitemap { sitemap_url } => format!("sitemap {} (provided)", sitemap_url),
        PageSource::ManualUrls => "manual URL list".to_string(),
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push('\n');
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");
}

pub fn generate_text_report(result: &AnalysisResult) -> String {
    let mut report = String::new();
    let insights = &result.insights;

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                      ANCHORSCOPE INTERNAL LINK REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Site:         {}\n", result.base_url));
    report.push_str(&format!("Pages From:   {}\n", describe_source(&result.source)));
    report.push_str(&format!(
        "Completed:    {}\n",
        result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!(
        "Pages:        {} crawled, {} failed\n\n",
        result.successful_pages(),
        result.failed_pages().count()
    ));

    section(&mut report, "SUMMARY");
    report.push_str(&format!("Unique anchor texts:    {}\n", insights.total_unique_anchors));
    report.push_str(&format!("Internal links:         {}\n", insights.total_internal_links));
    report.push_str(&format!(
        "Links per page:         {:.1}\n",
        insights.average_links_per_page
    ));
    if let Some(ref top) = insights.most_frequent_anchor {
        report.push_str(&format!(
            "Most frequent anchor:   \"{}\" ({})\n",
            top.text, top.count
        ));
    }
    report.push_str(&format!("Used only once:         {}\n\n", insights.single_usage_anchors));

    if !insights.top_anchors.is_empty() {
        report.push_str("Top anchors:\n");
        for (idx, anchor) in insights.top_anchors.iter().enumerate() {
            report.push_str(&format!("  {:>2}. {} ({})\n", idx + 1, anchor.text, anchor.count));
        }
        report.push('\n');
    }

    if !result.anchors.is_empty() {
        section(&mut report, "ANCHORS");
        for record in &result.anchors {
            report.push_str(&format!(
                "{}  [{} links, {} pages]\n",
                record.text,
                record.count,
                record.page_count()
            ));
            for destination in &record.destinations {
                report.push_str(&format!(
                    "    {:>4}x {}\n",
                    destination.count,
                    extract_url_path(&destination.href)
                ));
            }
        }
        report.push('\n');
    }

    let failed: Vec<_> = result.failed_pages().collect();
    if !failed.is_empty() {
        section(&mut report, "FAILED PAGES");
        for page in failed {
            report.push_str(&format!("  {}\n", page.url));
            if let Some(ref error) = page.error {
                report.push_str(&wrap_text(error, 80, "      "));
            }
        }
        report.push('\n');
    }

    if !result.pages_with_no_links.is_empty() {
        section(&mut report, "PAGES WITHOUT INTERNAL LINKS");
        for url in &result.pages_with_no_links {
            report.push_str(&format!("  {}\n", url));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                               End of Report\n");
    report.push_str(RULE);
    report.push_str("\n\nGenerated by Anchorscope\n\n");

    report
}

pub fn generate_json_report(result: &AnalysisResult) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Anchorscope",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "analysis": result
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn generate_csv_report(result: &AnalysisResult) -> String {
    let mut csv = String::from("Anchor Text,Count,Pages,Destinations,URLs\r\n");
    for record in &result.anchors {
        csv.push_str(&format!(
            "{},{},{},{},{}\r\n",
            csv_field(&record.text),
            record.count,
            record.page_count(),
            record.destinations.len(),
            csv_field(&record.joined_hrefs())
        ));
    }
    csv
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

pub fn generate_markdown_report(result: &AnalysisResult) -> String {
    let insights = &result.insights;
    let mut md = String::new();

    md.push_str(&format!("# Internal link report: {}\n\n", result.base_url));
    md.push_str(&format!(
        "_Pages from {}, completed {}._\n\n",
        describe_source(&result.source),
        result.completed_at.format("%Y-%m-%d %H:%M UTC")
    ));

    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "- Pages crawled: {} ({} failed)\n",
        result.successful_pages(),
        result.failed_pages().count()
    ));
    md.push_str(&format!("- Unique anchor texts: {}\n", insights.total_unique_anchors));
    md.push_str(&format!("- Internal links: {}\n", insights.total_internal_links));
    md.push_str(&format!(
        "- Links per page: {:.1}\n",
        insights.average_links_per_page
    ));
    if let Some(ref top) = insights.most_frequent_anchor {
        md.push_str(&format!(
            "- Most frequent anchor: **{}** ({})\n",
            markdown_cell(&top.text),
            top.count
        ));
    }
    md.push_str(&format!("- Used only once: {}\n\n", insights.single_usage_anchors));

    md.push_str("## Anchors\n\n");
    md.push_str("| Anchor text | Count | Pages | Destinations |\n");
    md.push_str("|---|---:|---:|---|\n");
    for record in &result.anchors {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            markdown_cell(&record.text),
            record.count,
            record.page_count(),
            markdown_cell(&record.joined_hrefs())
        ));
    }

    let failed: Vec<_> = result.failed_pages().collect();
    if !failed.is_empty() {
        md.push_str("\n## Failed pages\n\n");
        for page in failed {
            md.push_str(&format!(
                "- {}: {}\n",
                page.url,
                page.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    if !result.pages_with_no_links.is_empty() {
        md.push_str("\n## Pages without internal links\n\n");
        for url in &result.pages_with_no_links {
            md.push_str(&format!("- {}\n", url));
        }
    }

    md
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width.saturating_sub(indent.len())
            && !current_line.is_empty()
        {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
