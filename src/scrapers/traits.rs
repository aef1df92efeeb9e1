use crate::models::{PropertyRecord, Source};
use crate::scrapers::types::SearchQuery;
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for all property scrapers, as seen by the HTTP layer
#[async_trait]
pub trait ScraperTrait: Send + Sync {
    /// Scrape one logical page of properties from the source
    async fn scrape(&self, query: &SearchQuery) -> Result<Vec<PropertyRecord>>;

    /// Get the source this scraper serves
    fn source(&self) -> Source;
}

/// Turns a rendered listing page into records
pub trait ListingExtractor: Send + Sync {
    /// Every card with a name and a link, in document order
    fn extract(&self, html: &str) -> Vec<PropertyRecord>;
}

/// Fills in what only the detail page knows. Never fails: anything that goes
/// wrong leaves the fields absent.
pub trait DetailEnricher: Send + Sync {
    fn enrich(&self, record: &mut PropertyRecord);
}

/// How a source spreads its results over pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    /// Discrete result pages, one URL each; stops at the first empty page
    SitePages { scroll_passes: u32, max_site_pages: u32 },
    /// One endlessly scrolling page; stops when the height stops growing
    ContinuousScroll { max_scrolls: u32 },
}

/// Everything the pagination driver needs to know about one site
pub trait ListingSource: Send + Sync {
    fn source(&self) -> Source;

    fn strategy(&self) -> PaginationStrategy;

    /// URL of `site_page` for `query`, or `None` when the search cannot be
    /// expressed for this site (nothing to scrape)
    fn search_url(&self, query: &SearchQuery, site_page: u32) -> Result<Option<String>>;

    fn extractor(&self) -> &dyn ListingExtractor;

    fn enricher(&self) -> &dyn DetailEnricher;
}
