use crate::models::{PropertyRecord, Source};
use crate::scrapers::{ScraperTrait, SearchQuery};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Combined listings, keyed by source
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AllListings {
    pub squareyard: Vec<PropertyRecord>,
    pub nobroker: Vec<PropertyRecord>,
    pub housing: Vec<PropertyRecord>,
}

/// Dispatches queries to the per-source scrapers
pub struct Aggregator {
    scrapers: HashMap<Source, Arc<dyn ScraperTrait>>,
}

impl Aggregator {
    pub fn new(scrapers: HashMap<Source, Arc<dyn ScraperTrait>>) -> Self {
        Self { scrapers }
    }

    /// One logical page from a single source; failures propagate
    pub async fn fetch(&self, source: Source, query: &SearchQuery) -> Result<Vec<PropertyRecord>> {
        let scraper = self
            .scrapers
            .get(&source)
            .ok_or_else(|| anyhow!("no scraper registered for {}", source))?;
        scraper.scrape(query).await
    }

    /// A failing source contributes an empty list instead of failing the others
    async fn fetch_isolated(&self, source: Source, query: &SearchQuery) -> Vec<PropertyRecord> {
        match self.fetch(source, query).await {
            Ok(records) => records,
            Err(err) => {
                warn!("{} failed, returning no listings for it: {:#}", source, err);
                Vec::new()
            }
        }
    }

    /// All sources concurrently; waits for every one of them
    pub async fn fetch_all(&self, query: &SearchQuery) -> AllListings {
        let (squareyard, nobroker, housing) = tokio::join!(
            self.fetch_isolated(Source::SquareYards, query),
            self.fetch_isolated(Source::NoBroker, query),
            self.fetch_isolated(Source::Housing, query),
        );

        AllListings {
            squareyard,
            nobroker,
            housing,
        }
    }
}
