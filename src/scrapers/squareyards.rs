use crate::config::Settings;
use crate::models::{PropertyRecord, Source};
use crate::scrapers::browser::PageRenderer;
use crate::scrapers::dom::{
    absolute_url, first_attr, first_text, non_blank, nth_text, parse_coordinate, selector,
};
use crate::scrapers::traits::{DetailEnricher, ListingExtractor, ListingSource, PaginationStrategy};
use crate::scrapers::types::{slugify, SearchQuery};
use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

/// Locators shared by both card layouts
struct CommonSelectors {
    price: Selector,
    info: Selector,
    info_span: Selector,
    description: Selector,
    agent: Selector,
    image: Selector,
}

impl CommonSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            price: selector("div.npListingPrice strong")?,
            info: selector("li.npListingInfo")?,
            info_span: selector("span")?,
            description: selector("div.npDescBox p")?,
            agent: selector("div.npUserName strong")?,
            image: selector("img.img-responsive")?,
        })
    }

    /// Fields both layouts carry with identical markup
    fn fill(&self, card: ElementRef, record: &mut PropertyRecord) {
        record.price = first_text(card, &self.price);
        if let Some(info) = card.select(&self.info).next() {
            record.possession_status = nth_text(info, &self.info_span, 0);
            record.built_up = nth_text(info, &self.info_span, 1);
        }
        record.description = first_text(card, &self.description);
        record.agent_name = first_text(card, &self.agent);
        if let Some(img) = card.select(&self.image).next() {
            let src = non_blank(img.value().attr("src"))
                .or_else(|| non_blank(img.value().attr("data-src")));
            record.image = src
                .and_then(|s| absolute_url(Source::SquareYards.origin(), &s))
                .into_iter()
                .collect();
        }
    }
}

/// Extracts both the featured "club" cards and the scrollable tiles.
///
/// Listings are split between the two layouts without overlap, so both are
/// always extracted and concatenated, club cards first.
pub struct SquareYardsExtractor {
    club_card: Selector,
    club_name: Selector,
    club_location: Selector,
    club_type: Selector,
    club_link: Selector,
    tile_card: Selector,
    tile_name: Selector,
    tile_location: Selector,
    tile_link: Selector,
    common: CommonSelectors,
}

impl SquareYardsExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            club_card: selector("div.clubListingsItem")?,
            club_name: selector("a.strong")?,
            club_location: selector("div.npDeveloperLocation")?,
            club_type: selector("h2.npListingLink")?,
            club_link: selector("a[href]")?,
            tile_card: selector("div.npListingTile")?,
            tile_name: selector("h2.npListingLink")?,
            tile_location: selector("div.npListingUnit span")?,
            tile_link: selector("ul.npTagBox")?,
            common: CommonSelectors::new()?,
        })
    }

    fn club_listing(&self, card: ElementRef) -> PropertyRecord {
        let mut record = PropertyRecord::new(Source::SquareYards);
        record.name = first_text(card, &self.club_name);
        record.address = first_text(card, &self.club_location);
        record.apartment_type = first_text(card, &self.club_type);
        record.link = first_attr(card, &self.club_link, "href")
            .and_then(|href| absolute_url(Source::SquareYards.origin(), &href));
        self.common.fill(card, &mut record);
        record
    }

    fn tile_listing(&self, card: ElementRef) -> PropertyRecord {
        let mut record = PropertyRecord::new(Source::SquareYards);
        record.name = first_text(card, &self.tile_name);
        record.address = first_text(card, &self.tile_location);
        record.link = first_attr(card, &self.tile_link, "onclick")
            .and_then(|onclick| onclick_target(&onclick))
            .and_then(|href| absolute_url(Source::SquareYards.origin(), &href));
        self.common.fill(card, &mut record);
        record
    }
}

/// The tiles navigate via `onclick="window.open('<url>')"`; take the quoted URL
fn onclick_target(onclick: &str) -> Option<String> {
    onclick.split('\'').nth(1).and_then(|s| non_blank(Some(s)))
}

impl ListingExtractor for SquareYardsExtractor {
    fn extract(&self, html: &str) -> Vec<PropertyRecord> {
        let document = Html::parse_document(html);

        let club = document.select(&self.club_card).map(|c| self.club_listing(c));
        let tiles = document.select(&self.tile_card).map(|c| self.tile_listing(c));

        let mut properties = Vec::new();
        for (idx, record) in club.chain(tiles).enumerate() {
            if record.has_identity() {
                properties.push(record);
            } else {
                debug!("Skipped SquareYards card {}: missing name or link", idx);
            }
        }
        properties
    }
}

/// Renders each detail page and reads the map pin's data attributes
pub struct SquareYardsEnricher {
    renderer: PageRenderer,
    located: Selector,
}

impl SquareYardsEnricher {
    pub fn new(renderer: PageRenderer) -> Result<Self> {
        Ok(Self {
            renderer,
            located: selector("li.locatedLi")?,
        })
    }

    fn coordinates(&self, html: &str) -> (Option<f64>, Option<f64>) {
        let document = Html::parse_document(html);
        let Some(pin) = document.select(&self.located).next() else {
            return (None, None);
        };
        let read = |attr| pin.value().attr(attr).and_then(parse_coordinate);
        (read("data-latitude"), read("data-longitude"))
    }
}

impl DetailEnricher for SquareYardsEnricher {
    fn enrich(&self, record: &mut PropertyRecord) {
        let Some(link) = record.link.clone() else {
            return;
        };
        match self.renderer.render_once(&link, 0) {
            Ok(html) => {
                let (latitude, longitude) = self.coordinates(&html);
                record.latitude = latitude;
                record.longitude = longitude;
            }
            Err(err) => warn!("Could not render SquareYards detail page {}: {:#}", link, err),
        }
    }
}

/// SquareYards search results, one URL per site page
pub struct SquareYards {
    extractor: SquareYardsExtractor,
    enricher: SquareYardsEnricher,
    max_site_pages: u32,
}

impl SquareYards {
    pub fn new(settings: &Settings, renderer: PageRenderer) -> Result<Self> {
        Ok(Self {
            extractor: SquareYardsExtractor::new()?,
            enricher: SquareYardsEnricher::new(renderer)?,
            max_site_pages: settings.max_site_pages,
        })
    }
}

impl ListingSource for SquareYards {
    fn source(&self) -> Source {
        Source::SquareYards
    }

    fn strategy(&self) -> PaginationStrategy {
        PaginationStrategy::SitePages {
            scroll_passes: 0,
            max_site_pages: self.max_site_pages,
        }
    }

    fn search_url(&self, query: &SearchQuery, site_page: u32) -> Result<Option<String>> {
        let mut url = format!(
            "{}/sale/property-for-sale-in-{}-{}",
            Source::SquareYards.origin(),
            slugify(&query.locality, '-'),
            slugify(&query.city, '-'),
        );
        if site_page > 1 {
            url.push_str(&format!("?page={}", site_page));
        }
        info!("SquareYards site page {}: {}", site_page, url);
        Ok(Some(url))
    }

    fn extractor(&self) -> &dyn ListingExtractor {
        &self.extractor
    }

    fn enricher(&self) -> &dyn DetailEnricher {
        &self.enricher
    }
}
