use crate::config::Settings;
use crate::models::{PropertyRecord, Source};
use crate::scrapers::browser::{BrowserProvider, PageRenderer, RenderOptions};
use crate::scrapers::fetch::HttpFetcher;
use crate::scrapers::geocoding::GooglePlacesGeocoder;
use crate::scrapers::housing::Housing;
use crate::scrapers::nobroker::NoBroker;
use crate::scrapers::pagination::PaginationDriver;
use crate::scrapers::squareyards::SquareYards;
use crate::scrapers::traits::{ListingSource, ScraperTrait};
use crate::scrapers::types::{Cancellation, SearchQuery};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Wire up one site with fresh clients. Blocking clients are created here, so
/// this must run off the async runtime.
pub fn build_source(
    source: Source,
    settings: &Settings,
    renderer: &PageRenderer,
) -> Result<Box<dyn ListingSource>> {
    Ok(match source {
        Source::SquareYards => Box::new(SquareYards::new(settings, renderer.clone())?),
        Source::NoBroker => {
            let fetcher = Arc::new(HttpFetcher::from_settings(settings)?);
            let geocoder = Arc::new(GooglePlacesGeocoder::from_settings(settings)?);
            Box::new(NoBroker::new(settings, geocoder, fetcher)?)
        }
        Source::Housing => {
            let fetcher = Arc::new(HttpFetcher::from_settings(settings)?);
            Box::new(Housing::new(settings, fetcher)?)
        }
    })
}

/// Runs a full pagination for one source on a blocking worker, bounded by a
/// run timeout. Each call gets its own browser session and HTTP clients.
pub struct SourceScraper {
    source: Source,
    settings: Arc<Settings>,
    provider: Arc<dyn BrowserProvider>,
    run_timeout: Duration,
}

impl SourceScraper {
    pub fn new(source: Source, settings: Arc<Settings>, provider: Arc<dyn BrowserProvider>) -> Self {
        let run_timeout = settings.run_timeout();
        Self {
            source,
            settings,
            provider,
            run_timeout,
        }
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }
}

/// Cancels the blocking worker once the awaiting side is gone, including when
/// the request future is dropped mid-run.
struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[async_trait]
impl ScraperTrait for SourceScraper {
    async fn scrape(&self, query: &SearchQuery) -> Result<Vec<PropertyRecord>> {
        let source = self.source;
        let settings = self.settings.clone();
        let provider = self.provider.clone();
        let query = query.clone();
        let cancellation = Cancellation::new();
        let _cancel_on_drop = CancelOnDrop(cancellation.clone());

        let run = tokio::task::spawn_blocking(move || {
            let renderer = PageRenderer::new(provider, RenderOptions::from_settings(&settings));
            let listing = build_source(source, &settings, &renderer)?;
            PaginationDriver::new(listing.as_ref(), &renderer, settings.page_size)
                .with_cancellation(cancellation)
                .paginate(&query)
        });

        // A timed-out worker stops at its next page, scroll or enrichment and
        // closes its browser session; its result is discarded.
        let records = tokio::time::timeout(self.run_timeout, run)
            .await
            .map_err(|_| anyhow!("{} scrape timed out after {:?}", source, self.run_timeout))?
            .with_context(|| format!("{} scrape task failed", source))??;

        info!("{} returned {} records", source, records.len());
        Ok(records)
    }

    fn source(&self) -> Source {
        self.source
    }
}

/// One scraper per source, all sharing the browser factory
pub fn scrapers(
    settings: Arc<Settings>,
    provider: Arc<dyn BrowserProvider>,
) -> HashMap<Source, Arc<dyn ScraperTrait>> {
    Source::ALL
        .into_iter()
        .map(|source| {
            let scraper: Arc<dyn ScraperTrait> =
                Arc::new(SourceScraper::new(source, settings.clone(), provider.clone()));
            (source, scraper)
        })
        .collect()
}
