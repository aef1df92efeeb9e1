use crate::config::Settings;
use crate::scrapers::types::RetryPolicy;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

const FIND_PLACE_ENDPOINT: &str =
    "https://maps.googleapis.com/maps/api/place/findplacefromtext/json";

/// A resolved place
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub place_id: String,
    pub lat: f64,
    pub lon: f64,
}

/// Resolves free text like "Powai, Mumbai" to a place
pub trait Geocoder: Send + Sync {
    fn find_place(&self, query: &str) -> Result<Option<Place>>;
}

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    status: String,
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    place_id: Option<String>,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Google Places "find place from text" lookup
pub struct GooglePlacesGeocoder {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    retry: RetryPolicy,
}

impl GooglePlacesGeocoder {
    pub fn new(client: Client, api_key: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            api_key,
            endpoint: FIND_PLACE_ENDPOINT.to_string(),
            retry,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to create geocoding client")?;

        Ok(Self::new(
            client,
            settings.google_api_key.clone(),
            RetryPolicy::new(settings.max_retries, settings.retry_backoff()),
        ))
    }

    /// Point the lookup at another endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request(&self, query: &str, key: &str) -> Result<FindPlaceResponse> {
        self.client
            .get(&self.endpoint)
            .query(&[
                ("input", query),
                ("inputtype", "textquery"),
                ("fields", "geometry,place_id"),
                ("key", key),
            ])
            .send()
            .context("Geocoding request failed")?
            .error_for_status()
            .context("Geocoding request rejected")?
            .json::<FindPlaceResponse>()
            .context("Failed to parse geocoding response")
    }
}

impl Geocoder for GooglePlacesGeocoder {
    fn find_place(&self, query: &str) -> Result<Option<Place>> {
        let Some(key) = self.api_key.as_deref() else {
            warn!("No geocoding API key configured, cannot resolve '{}'", query);
            return Ok(None);
        };

        let response = self
            .retry
            .run("geocoding request", || self.request(query, key))?;

        if response.status != "OK" {
            debug!("Geocoding '{}' returned status {}", query, response.status);
            return Ok(None);
        }

        Ok(response.candidates.into_iter().next().and_then(|candidate| {
            candidate.place_id.map(|place_id| Place {
                place_id,
                lat: candidate.geometry.location.lat,
                lon: candidate.geometry.location.lng,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // The blocking client has to be created off the async runtime.
    async fn find_place(server: &MockServer, key: Option<&str>, query: &str) -> Option<Place> {
        let endpoint = format!("{}/findplace", server.uri());
        let key = key.map(str::to_string);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || {
            GooglePlacesGeocoder::new(Client::new(), key, RetryPolicy::none())
                .with_endpoint(endpoint)
                .find_place(&query)
        })
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_candidate_is_used() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("input", "Powai, Mumbai"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "candidates": [
                    {"place_id": "ChIJ-powai", "geometry": {"location": {"lat": 19.1176, "lng": 72.906}}},
                    {"place_id": "ChIJ-other", "geometry": {"location": {"lat": 1.0, "lng": 2.0}}}
                ]
            })))
            .mount(&server)
            .await;

        let place = find_place(&server, Some("secret"), "Powai, Mumbai").await;

        assert_eq!(
            place,
            Some(Place {
                place_id: "ChIJ-powai".to_string(),
                lat: 19.1176,
                lon: 72.906,
            })
        );
    }

    #[tokio::test]
    async fn test_zero_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "ZERO_RESULTS", "candidates": []})),
            )
            .mount(&server)
            .await;

        let place = find_place(&server, Some("secret"), "Nowhere, Atlantis").await;

        assert_eq!(place, None);
    }

    #[tokio::test]
    async fn test_missing_key_skips_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let place = find_place(&server, None, "Powai, Mumbai").await;

        assert_eq!(place, None);
    }
}
