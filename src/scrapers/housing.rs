use crate::config::Settings;
use crate::models::{PropertyRecord, Source};
use crate::scrapers::dom::{absolute_url, first_attr, first_text, parse_coordinate, selector};
use crate::scrapers::fetch::DetailFetcher;
use crate::scrapers::traits::{DetailEnricher, ListingExtractor, ListingSource, PaginationStrategy};
use crate::scrapers::types::{slugify, SearchQuery};
use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use urlencoding::encode;

/// Extracts Housing.com's result cards
pub struct HousingExtractor {
    card: Selector,
    name: Selector,
    emi: Selector,
    price: Selector,
    agent: Selector,
    link: Selector,
    image: Selector,
}

impl HousingExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            card: selector("article[data-testid=\"card-container\"]")?,
            name: selector("h2.T_4d93cd45")?,
            emi: selector("span._9jtlke")?,
            price: selector("div[data-testid=\"priceid\"]")?,
            agent: selector("div._c81fwx")?,
            link: selector("a[data-q=\"title\"][href]")?,
            image: selector("img[src]")?,
        })
    }

    fn listing(&self, card: ElementRef) -> PropertyRecord {
        let mut record = PropertyRecord::new(Source::Housing);
        record.name = first_text(card, &self.name);
        record.emi = first_text(card, &self.emi);
        record.price = first_text(card, &self.price);
        record.agent_name = first_text(card, &self.agent);
        record.link = first_attr(card, &self.link, "href")
            .and_then(|href| absolute_url(Source::Housing.origin(), &href));
        record.image = first_attr(card, &self.image, "src")
            .filter(|src| !src.starts_with("data:"))
            .and_then(|src| absolute_url(Source::Housing.origin(), &src))
            .into_iter()
            .collect();
        record
    }
}

impl ListingExtractor for HousingExtractor {
    fn extract(&self, html: &str) -> Vec<PropertyRecord> {
        let document = Html::parse_document(html);
        let mut properties = Vec::new();
        for (idx, card) in document.select(&self.card).enumerate() {
            let record = self.listing(card);
            if record.has_identity() {
                properties.push(record);
            } else {
                debug!("Skipped Housing.com card {}: missing name or link", idx);
            }
        }
        properties
    }
}

/// What a Housing.com detail page adds to a card
#[derive(Debug, Default, PartialEq)]
pub struct HousingDetails {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub gallery_image: Option<String>,
}

/// Reads coordinates from the detail page's JSON-LD (falling back to geo
/// microdata) and the second gallery image
pub struct HousingEnricher {
    fetcher: Arc<dyn DetailFetcher>,
    ld_json: Selector,
    geo_latitude: Selector,
    geo_longitude: Selector,
    gallery_image: Selector,
}

impl HousingEnricher {
    pub fn new(fetcher: Arc<dyn DetailFetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            ld_json: selector("script[type=\"application/ld+json\"]")?,
            geo_latitude: selector("[itemprop=\"geo\"] [itemprop=\"latitude\"]")?,
            geo_longitude: selector("[itemprop=\"geo\"] [itemprop=\"longitude\"]")?,
            gallery_image: selector("div[data-q=\"gallery\"] img[src]")?,
        })
    }

    pub fn details(&self, html: &str) -> HousingDetails {
        let document = Html::parse_document(html);

        let (mut latitude, mut longitude) = document
            .select(&self.ld_json)
            .next()
            .map(|script| script.text().collect::<String>())
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
            .map(|data| ld_json_geo(&data))
            .unwrap_or((None, None));

        if latitude.is_none() || longitude.is_none() {
            let read = |sel: &Selector| {
                document.select(sel).next().and_then(|el| {
                    el.value()
                        .attr("content")
                        .and_then(parse_coordinate)
                        .or_else(|| parse_coordinate(&el.text().collect::<String>()))
                })
            };
            latitude = read(&self.geo_latitude);
            longitude = read(&self.geo_longitude);
        }

        let gallery_image = document
            .select(&self.gallery_image)
            .nth(1)
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| absolute_url(Source::Housing.origin(), src));

        HousingDetails {
            latitude,
            longitude,
            gallery_image,
        }
    }
}

/// Coordinates from a JSON-LD block: either a single object with `geo`, or a
/// list where the first typed item carrying `geo` wins
fn ld_json_geo(data: &Value) -> (Option<f64>, Option<f64>) {
    let geo = match data {
        Value::Array(items) => items
            .iter()
            .find(|item| item.get("@type").is_some() && item.get("geo").is_some())
            .and_then(|item| item.get("geo")),
        Value::Object(_) => data.get("geo"),
        _ => None,
    };
    let Some(geo) = geo else {
        return (None, None);
    };
    (
        geo.get("latitude").and_then(json_coordinate),
        geo.get("longitude").and_then(json_coordinate),
    )
}

fn json_coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_coordinate(s),
        _ => None,
    }
}

impl DetailEnricher for HousingEnricher {
    fn enrich(&self, record: &mut PropertyRecord) {
        let Some(link) = record.link.clone() else {
            return;
        };
        let html = match self.fetcher.fetch(&link) {
            Ok(Some(html)) => html,
            Ok(None) => {
                debug!("Housing.com detail page {} unavailable", link);
                return;
            }
            Err(err) => {
                warn!("Could not fetch Housing.com detail page {}: {:#}", link, err);
                return;
            }
        };

        let details = self.details(&html);
        record.latitude = details.latitude;
        record.longitude = details.longitude;
        if let Some(image) = details.gallery_image {
            if !record.image.contains(&image) {
                record.image.push(image);
            }
        }
    }
}

/// Housing.com search results, one URL per site page, lazily loaded on scroll
pub struct Housing {
    extractor: HousingExtractor,
    enricher: HousingEnricher,
    scroll_passes: u32,
    max_site_pages: u32,
}

impl Housing {
    pub fn new(settings: &Settings, fetcher: Arc<dyn DetailFetcher>) -> Result<Self> {
        Ok(Self {
            extractor: HousingExtractor::new()?,
            enricher: HousingEnricher::new(fetcher)?,
            scroll_passes: settings.housing_scroll_passes,
            max_site_pages: settings.max_site_pages,
        })
    }
}

impl ListingSource for Housing {
    fn source(&self) -> Source {
        Source::Housing
    }

    fn strategy(&self) -> PaginationStrategy {
        PaginationStrategy::SitePages {
            scroll_passes: self.scroll_passes,
            max_site_pages: self.max_site_pages,
        }
    }

    fn search_url(&self, query: &SearchQuery, site_page: u32) -> Result<Option<String>> {
        let mut url = format!(
            "{}/in/buy/{}/{}",
            Source::Housing.origin(),
            encode(&slugify(&query.city, '_')),
            encode(&slugify(&query.locality, '_')),
        );
        if site_page > 1 {
            url.push_str(&format!("?page={}", site_page));
        }
        info!("Housing.com site page {}: {}", site_page, url);
        Ok(Some(url))
    }

    fn extractor(&self) -> &dyn ListingExtractor {
        &self.extractor
    }

    fn enricher(&self) -> &dyn DetailEnricher {
        &self.enricher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct OnePage(String);

    impl DetailFetcher for OnePage {
        fn fetch(&self, _url: &str) -> Result<Option<String>> {
            Ok(Some(self.0.clone()))
        }
    }

    struct Unreachable;

    impl DetailFetcher for Unreachable {
        fn fetch(&self, url: &str) -> Result<Option<String>> {
            bail!("connection refused: {}", url)
        }
    }

    fn enricher(fetcher: impl DetailFetcher + 'static) -> HousingEnricher {
        HousingEnricher::new(Arc::new(fetcher)).unwrap()
    }

    #[test]
    fn test_cards() {
        let html = r#"
            <article data-testid="card-container">
              <img src="https://is1-3.housingcdn.com/card.jpg">
              <a data-q="title" href="/in/buy/projects/page/1234-m3m-golf-estate">
                <h2 class="T_4d93cd45">M3M Golf Estate</h2>
              </a>
              <div data-testid="priceid">₹4.5 Cr</div>
              <span class="_9jtlke">EMI starts at ₹2.4 L</span>
              <div class="_c81fwx">M3M India</div>
            </article>
            <article data-testid="card-container">
              <h2 class="T_4d93cd45">No link</h2>
            </article>
        "#;

        let records = HousingExtractor::new().unwrap().extract(html);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name.as_deref(), Some("M3M Golf Estate"));
        assert_eq!(
            record.link.as_deref(),
            Some("https://housing.com/in/buy/projects/page/1234-m3m-golf-estate")
        );
        assert_eq!(record.price.as_deref(), Some("₹4.5 Cr"));
        assert_eq!(record.emi.as_deref(), Some("EMI starts at ₹2.4 L"));
        assert_eq!(record.agent_name.as_deref(), Some("M3M India"));
        assert_eq!(record.image, vec!["https://is1-3.housingcdn.com/card.jpg".to_string()]);
        assert_eq!(record.possession_status, None);
    }

    #[test]
    fn test_minimal_card_yields_record_with_absent_fields() {
        let html = r#"<article data-testid="card-container">
              <a data-q="title" href="/in/buy/resale/page/7781-flat"><h2 class="T_4d93cd45">3 BHK Flat</h2></a>
            </article>"#;
        let records = HousingExtractor::new().unwrap().extract(html);

        assert_eq!(records.len(), 1);
        let mut expected = PropertyRecord::new(Source::Housing);
        expected.name = Some("3 BHK Flat".to_string());
        expected.link = Some("https://housing.com/in/buy/resale/page/7781-flat".to_string());
        assert_eq!(records[0], expected);
    }

    #[test]
    fn test_details_from_ld_json_object() {
        let html = r#"
            <script type="application/ld+json">{"@type": "Residence", "geo": {"latitude": 28.4595, "longitude": "77.0266"}}</script>
            <div data-q="gallery">
              <img src="//is1-2.housingcdn.com/first.jpg">
              <img src="//is1-2.housingcdn.com/second.jpg">
            </div>
        "#;

        let details = enricher(Unreachable).details(html);

        assert_eq!(
            details,
            HousingDetails {
                latitude: Some(28.4595),
                longitude: Some(77.0266),
                gallery_image: Some("https://is1-2.housingcdn.com/second.jpg".to_string()),
            }
        );
    }

    #[test]
    fn test_details_from_ld_json_list() {
        let html = r#"
            <script type="application/ld+json">[
              {"@context": "https://schema.org", "name": "breadcrumbs"},
              {"@type": "Apartment", "geo": {"latitude": "12.97", "longitude": "77.59"}}
            ]</script>
        "#;

        let details = enricher(Unreachable).details(html);

        assert_eq!(details.latitude, Some(12.97));
        assert_eq!(details.longitude, Some(77.59));
        assert_eq!(details.gallery_image, None);
    }

    #[test]
    fn test_details_fall_back_to_microdata() {
        let html = r#"
            <script type="application/ld+json">{not json</script>
            <div itemprop="geo">
              <meta itemprop="latitude" content="19.07">
              <meta itemprop="longitude" content="72.87">
            </div>
        "#;

        let details = enricher(Unreachable).details(html);

        assert_eq!((details.latitude, details.longitude), (Some(19.07), Some(72.87)));
    }

    #[test]
    fn test_enrich_appends_distinct_gallery_image() {
        let detail = r#"
            <div data-q="gallery">
              <img src="https://is1-3.housingcdn.com/card.jpg">
              <img src="https://is1-3.housingcdn.com/inside.jpg">
            </div>
        "#;
        let enricher = enricher(OnePage(detail.to_string()));

        let mut record = PropertyRecord::new(Source::Housing);
        record.link = Some("https://housing.com/in/buy/resale/page/1".to_string());
        record.image = vec!["https://is1-3.housingcdn.com/card.jpg".to_string()];
        enricher.enrich(&mut record);

        assert_eq!(
            record.image,
            vec![
                "https://is1-3.housingcdn.com/card.jpg".to_string(),
                "https://is1-3.housingcdn.com/inside.jpg".to_string(),
            ]
        );
        assert_eq!(record.latitude, None);
    }

    #[test]
    fn test_enrich_survives_fetch_failure() {
        let mut record = PropertyRecord::new(Source::Housing);
        record.link = Some("https://housing.com/in/buy/resale/page/1".to_string());
        enricher(Unreachable).enrich(&mut record);

        assert_eq!((record.latitude, record.longitude), (None, None));
        assert!(record.image.is_empty());
    }

    #[test]
    fn test_search_url() {
        let source = Housing::new(&Settings::default(), Arc::new(Unreachable)).unwrap();
        let query = SearchQuery::new("Gurgaon", "Sector 9", 2);

        assert_eq!(
            source.search_url(&query, 1).unwrap().as_deref(),
            Some("https://housing.com/in/buy/gurgaon/sector_9")
        );
        assert_eq!(
            source.search_url(&query, 2).unwrap().as_deref(),
            Some("https://housing.com/in/buy/gurgaon/sector_9?page=2")
        );
    }
}
