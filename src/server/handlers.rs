//! Listing endpoint handlers.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::ApiError;
use super::AppState;
use crate::aggregator::AllListings;
use crate::models::{PropertyRecord, Source};
use crate::scrapers::SearchQuery;
use crate::storage;

fn first_page() -> i64 {
    1
}

/// Query parameters shared by every listing endpoint
#[derive(Debug, Deserialize)]
pub struct ListingParams {
    pub city: String,
    pub locality: String,
    #[serde(default = "first_page")]
    pub page: i64,
}

impl ListingParams {
    fn into_query(self) -> Result<SearchQuery, ApiError> {
        if self.page < 1 {
            return Err(ApiError::InvalidQuery(format!(
                "page must be greater than or equal to 1, got {}",
                self.page
            )));
        }
        if self.city.trim().is_empty() || self.locality.trim().is_empty() {
            return Err(ApiError::InvalidQuery(
                "city and locality must not be empty".to_string(),
            ));
        }
        Ok(SearchQuery::new(self.city, self.locality, self.page as usize))
    }
}

fn parse_query(params: Result<Query<ListingParams>, QueryRejection>) -> Result<SearchQuery, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::InvalidQuery(rejection.body_text()))?;
    params.into_query()
}

/// Single-source response body
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub data: Vec<PropertyRecord>,
}

async fn persist<T: Serialize>(state: &AppState, label: &str, query: &SearchQuery, payload: &T) {
    let Some(dir) = state.output_dir.as_deref() else {
        return;
    };
    if let Err(err) = storage::save_results(dir, label, &query.city, &query.locality, payload).await {
        warn!("Could not save {} results: {:#}", label, err);
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// `GET /{source}`: one logical page from one source.
pub async fn source_listings(
    State(state): State<AppState>,
    Path(source): Path<String>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> Result<Json<DataResponse>, ApiError> {
    let source: Source = source.parse().map_err(|_| ApiError::UnknownSource(source))?;
    let query = parse_query(params)?;

    let data = state.aggregator.fetch(source, &query).await?;
    let response = DataResponse { data };
    persist(&state, source.as_str(), &query, &response).await;

    Ok(Json(response))
}

/// `GET /all`: every source concurrently, keyed by source.
pub async fn all_listings(
    State(state): State<AppState>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> Result<Json<AllListings>, ApiError> {
    let query = parse_query(params)?;

    let listings = state.aggregator.fetch_all(&query).await;
    persist(&state, "all", &query, &listings).await;

    Ok(Json(listings))
}
