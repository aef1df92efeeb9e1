use crate::models::PropertyRecord;
use crate::scrapers::browser::PageRenderer;
use crate::scrapers::traits::{ListingSource, PaginationStrategy};
use crate::scrapers::types::{Cancellation, SearchQuery};
use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

/// Maps a logical API page onto however many site pages or scrolls it takes.
///
/// Records are accumulated until `page * page_size` exist or the source runs
/// dry, then the requested window is sliced out and enriched. Duplicates
/// across site pages are kept as-is. The run stops with an error at the next
/// page, scroll or enrichment once its cancellation fires.
pub struct PaginationDriver<'a> {
    source: &'a dyn ListingSource,
    renderer: &'a PageRenderer,
    page_size: usize,
    cancellation: Cancellation,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(source: &'a dyn ListingSource, renderer: &'a PageRenderer, page_size: usize) -> Self {
        Self {
            source,
            renderer,
            page_size: page_size.max(1),
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        self.cancellation
            .check(&format!("{} scrape", self.source.source()))
    }

    pub fn paginate(&self, query: &SearchQuery) -> Result<Vec<PropertyRecord>> {
        let source = self.source.source();
        let Some(desired) = query.desired_count(self.page_size) else {
            info!("{}: page {} is past any reachable record", source, query.page);
            return Ok(Vec::new());
        };
        info!(
            "Scraping {} for {}, {} (page {}, {} per page)",
            source, query.locality, query.city, query.page, self.page_size
        );

        let accumulated = match self.source.strategy() {
            PaginationStrategy::SitePages {
                scroll_passes,
                max_site_pages,
            } => self.collect_site_pages(query, desired, scroll_passes, max_site_pages)?,
            PaginationStrategy::ContinuousScroll { max_scrolls } => {
                self.collect_scrolling(query, desired, max_scrolls)?
            }
        };

        let total = accumulated.len();
        let mut window = slice_window(accumulated, query, self.page_size);
        info!(
            "{}: {} records accumulated, {} in page {}",
            source,
            total,
            window.len(),
            query.page
        );

        let now = Utc::now();
        let enricher = self.source.enricher();
        for record in &mut window {
            self.check_cancelled()?;
            record.city = Some(query.city.clone());
            record.locality = Some(query.locality.clone());
            record.created_at = Some(now);
            record.updated_at = Some(now);
            enricher.enrich(record);
        }

        Ok(window)
    }

    /// Walk site pages 1, 2, ... until enough records exist or a page comes back empty
    fn collect_site_pages(
        &self,
        query: &SearchQuery,
        desired: usize,
        scroll_passes: u32,
        max_site_pages: u32,
    ) -> Result<Vec<PropertyRecord>> {
        let extractor = self.source.extractor();
        let mut accumulated = Vec::new();
        if max_site_pages == 0 {
            return Ok(accumulated);
        }

        let Some(first_url) = self.source.search_url(query, 1)? else {
            return Ok(accumulated);
        };
        let mut session = self.renderer.acquire()?;
        let mut url = first_url;

        for site_page in 1..=max_site_pages {
            self.check_cancelled()?;
            let html = self.renderer.render(&mut *session, &url, scroll_passes)?;
            let records = extractor.extract(&html);
            debug!("Site page {} yielded {} records", site_page, records.len());

            if records.is_empty() {
                break;
            }
            accumulated.extend(records);
            if accumulated.len() >= desired || site_page == max_site_pages {
                break;
            }
            match self.source.search_url(query, site_page + 1)? {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(accumulated)
    }

    /// Scroll one page until its height stops growing or enough cards are loaded
    fn collect_scrolling(
        &self,
        query: &SearchQuery,
        desired: usize,
        max_scrolls: u32,
    ) -> Result<Vec<PropertyRecord>> {
        let Some(url) = self.source.search_url(query, 1)? else {
            return Ok(Vec::new());
        };
        let extractor = self.source.extractor();

        let mut session = self.renderer.acquire()?;
        self.renderer.open(&mut *session, &url)?;

        let mut last_height = session.scroll_height()?;
        let mut records = Vec::new();
        for scroll in 1..=max_scrolls {
            self.check_cancelled()?;
            let height = self.renderer.scroll_to_bottom(&mut *session)?;
            // The DOM keeps every card loaded so far, so each pass re-extracts it whole.
            records = extractor.extract(&self.renderer.capture(&mut *session)?);
            debug!("Scroll {}: height {}, {} records", scroll, height, records.len());

            if records.len() >= desired {
                break;
            }
            if height == last_height {
                debug!("Content height stalled at {}", height);
                break;
            }
            last_height = height;
        }

        Ok(records)
    }
}

/// `records[(page-1)*size .. page*size]`, clamped; empty past the end
pub fn slice_window(
    mut records: Vec<PropertyRecord>,
    query: &SearchQuery,
    page_size: usize,
) -> Vec<PropertyRecord> {
    let Some((start, end)) = query.window(page_size) else {
        return Vec::new();
    };
    if start >= records.len() {
        return Vec::new();
    }
    records.truncate(end);
    records.split_off(start)
}
