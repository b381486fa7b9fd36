use colored::Colorize;

pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod crawl;
pub mod data;
pub mod error;
pub mod layout;
pub mod protocol;
pub mod quota;
pub mod report;
pub mod table;

pub use aggregate::{AnalysisInsights, AnchorAggregator, AnchorRecord, AnchorSummary, Destination};
pub use analysis::{AnalysisResult, PageSource};
pub use config::{AnalyzerConfig, AnchorGrouping};
pub use crawl::{Analyzer, Outcome};
pub use error::{AnalysisError, ErrorKind};
pub use layout::{
    ColorBucket, FixedWidthMeasurer, LayoutConfig, LayoutItem, TextMeasurer, TextSize,
    WordCloudLayout, WordCloudLayoutEngine,
};
pub use protocol::{AnalysisRequest, AnalysisResponse, NegotiationStep, Step, UserInputRequest};
pub use quota::{MemoryQuotaStore, QuotaGate, QuotaStore, UsageQuota};
pub use table::{AnchorFilter, AnchorTable, SortDirection, SortKey};

pub fn print_banner() {
    let banner = r#"
     _                _
    / \   _ __   ___| |__   ___  _ __ ___  ___ ___  _ __   ___
   / _ \ | '_ \ / __| '_ \ / _ \| '__/ __|/ __/ _ \| '_ \ / _ \
  / ___ \| | | | (__| | | | (_) | |  \__ \ (_| (_) | |_) |  __/
 /_/   \_\_| |_|\___|_| |_|\___/|_|  |___/\___\___/| .__/ \___|
                                                   |_|
"#;
    eprintln!("{}", banner.bright_blue().bold());
    eprintln!(
        "{}",
        format!("  internal link analysis  v{}\n", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
