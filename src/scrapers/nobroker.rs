use crate::config::Settings;
use crate::models::{PropertyRecord, Source};
use crate::scrapers::dom::{
    absolute_url, element_text, first_attr, first_text, parse_coordinate, selector,
};
use crate::scrapers::fetch::DetailFetcher;
use crate::scrapers::geocoding::Geocoder;
use crate::scrapers::traits::{DetailEnricher, ListingExtractor, ListingSource, PaginationStrategy};
use crate::scrapers::types::SearchQuery;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use urlencoding::encode;

const IMAGE_ORIGIN: &str = "https://images.nobroker.in/images/";
const SEARCH_RADIUS_KM: &str = "2.0";

/// Extracts NoBroker's result cards
pub struct NoBrokerExtractor {
    card: Selector,
    name: Selector,
    address: Selector,
    link: Selector,
    price: Selector,
    per_sqft: Selector,
    emi: Selector,
    built_up: Selector,
    label: Selector,
    image: Selector,
}

impl NoBrokerExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            card: selector("div.nb__2_XSE")?,
            name: selector("h2.heading-6")?,
            address: selector("div.text-gray-light")?,
            link: selector("a[href]")?,
            price: selector("div.font-semi-bold.heading-6")?,
            per_sqft: selector("div.heading-7")?,
            emi: selector("div.heading-6#roomType")?,
            built_up: selector("div.flex#unitCode")?,
            label: selector("div.font-semibold")?,
            image: selector("meta[itemprop=\"image\"]")?,
        })
    }

    /// Value shown next to a labelled attribute ("Bathrooms", "Parking", ...).
    ///
    /// The value div sits right before the label div.
    fn labelled(&self, card: ElementRef, label: &str) -> Option<String> {
        let label = card
            .select(&self.label)
            .find(|el| element_text(*el).as_deref() == Some(label))?;
        label
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "div")
            .and_then(element_text)
    }

    fn listing(&self, card: ElementRef) -> PropertyRecord {
        let mut record = PropertyRecord::new(Source::NoBroker);
        record.name = first_text(card, &self.name);
        record.address = first_text(card, &self.address);
        record.link = first_attr(card, &self.link, "href")
            .and_then(|href| absolute_url(Source::NoBroker.origin(), &href));
        record.price = first_text(card, &self.price);
        record.per_sqft_price = first_text(card, &self.per_sqft);
        record.emi = first_text(card, &self.emi);
        record.built_up = first_text(card, &self.built_up);
        record.facing = self.labelled(card, "Facing");
        record.apartment_type = self.labelled(card, "Apartment Type");
        record.bathrooms = self.labelled(card, "Bathrooms");
        record.parking = self.labelled(card, "Parking");
        record.image = first_attr(card, &self.image, "content")
            .map(|content| format!("{}{}", IMAGE_ORIGIN, content))
            .into_iter()
            .collect();
        record
    }
}

impl ListingExtractor for NoBrokerExtractor {
    fn extract(&self, html: &str) -> Vec<PropertyRecord> {
        let document = Html::parse_document(html);
        document
            .select(&self.card)
            .map(|card| self.listing(card))
            .filter(|record| {
                let keep = record.has_identity();
                if !keep {
                    debug!("Skipped NoBroker card without name or link");
                }
                keep
            })
            .collect()
    }
}

/// Reads the geo microdata of a listing's detail page over plain HTTP
pub struct NoBrokerEnricher {
    fetcher: Arc<dyn DetailFetcher>,
    latitude: Selector,
    longitude: Selector,
}

impl NoBrokerEnricher {
    pub fn new(fetcher: Arc<dyn DetailFetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            latitude: selector("span[itemprop=\"geo\"] meta[itemprop=\"latitude\"]")?,
            longitude: selector("span[itemprop=\"geo\"] meta[itemprop=\"longitude\"]")?,
        })
    }

    fn coordinates(&self, html: &str) -> (Option<f64>, Option<f64>) {
        let document = Html::parse_document(html);
        let read = |sel: &Selector| {
            document
                .select(sel)
                .next()
                .and_then(|meta| meta.value().attr("content"))
                .and_then(parse_coordinate)
        };
        match (read(&self.latitude), read(&self.longitude)) {
            (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
            _ => (None, None),
        }
    }
}

impl DetailEnricher for NoBrokerEnricher {
    fn enrich(&self, record: &mut PropertyRecord) {
        let Some(link) = record.link.clone() else {
            return;
        };
        match self.fetcher.fetch(&link) {
            Ok(Some(html)) => {
                let (latitude, longitude) = self.coordinates(&html);
                record.latitude = latitude;
                record.longitude = longitude;
            }
            Ok(None) => debug!("NoBroker detail page {} unavailable", link),
            Err(err) => warn!("Could not fetch NoBroker detail page {}: {:#}", link, err),
        }
    }
}

/// NoBroker search: one geocoded URL whose results load while scrolling
pub struct NoBroker {
    geocoder: Arc<dyn Geocoder>,
    extractor: NoBrokerExtractor,
    enricher: NoBrokerEnricher,
    max_scrolls: u32,
}

impl NoBroker {
    pub fn new(
        settings: &Settings,
        geocoder: Arc<dyn Geocoder>,
        fetcher: Arc<dyn DetailFetcher>,
    ) -> Result<Self> {
        Ok(Self {
            geocoder,
            extractor: NoBrokerExtractor::new()?,
            enricher: NoBrokerEnricher::new(fetcher)?,
            max_scrolls: settings.max_scrolls,
        })
    }
}

impl ListingSource for NoBroker {
    fn source(&self) -> Source {
        Source::NoBroker
    }

    fn strategy(&self) -> PaginationStrategy {
        PaginationStrategy::ContinuousScroll {
            max_scrolls: self.max_scrolls,
        }
    }

    fn search_url(&self, query: &SearchQuery, _site_page: u32) -> Result<Option<String>> {
        let search = format!("{}, {}", query.locality, query.city);
        let place = self
            .geocoder
            .find_place(&search)
            .with_context(|| format!("Failed to geocode '{}'", search))?;

        let Some(place) = place else {
            warn!("No place found for '{}', skipping NoBroker", search);
            return Ok(None);
        };

        let search_param = json!([{
            "lat": place.lat,
            "lon": place.lon,
            "placeId": place.place_id,
            "placeName": query.locality.to_uppercase(),
        }]);
        let encoded = STANDARD.encode(search_param.to_string());

        let url = format!(
            "{origin}/property/sale/{city}/{locality}?searchParam={param}&radius={radius}&city={city}&locality={locality}",
            origin = Source::NoBroker.origin(),
            city = encode(&query.city),
            locality = encode(&query.locality),
            param = encode(&encoded),
            radius = SEARCH_RADIUS_KM,
        );
        info!("NoBroker search: {}", url);
        Ok(Some(url))
    }

    fn extractor(&self) -> &dyn ListingExtractor {
        &self.extractor
    }

    fn enricher(&self) -> &dyn DetailEnricher {
        &self.enricher
    }
}
