pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod result;
pub mod sitemap;

pub use crawler::{Crawler, ProgressCallback};
pub use error::ScanError;
pub use extract::{EmptyAnchorPolicy, LinkExtractor, PageLinks, same_site};
pub use fetch::{FetchedPage, HttpFetcher, PageFetcher};
pub use result::{AnchorOccurrence, CrawledPage, PageScan};
pub use sitemap::{SitemapDocument, SitemapListing};
