//! HTTP API serving scraped listings.
//!
//! - `GET /{source}`: one logical page from one source, wrapped in `data`
//! - `GET /all`: every source concurrently, keyed by source
//! - `GET /health`

mod error;
mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::config::Settings;
use crate::scrapers::{self, ChromeProvider};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    /// Where responses are saved, if anywhere
    pub output_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>) -> Self {
        let provider = Arc::new(ChromeProvider::new(&settings));
        let scrapers = scrapers::scrapers(settings.clone(), provider);

        Self {
            aggregator: Arc::new(Aggregator::new(scrapers)),
            output_dir: settings.output_dir.clone(),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: Arc<Settings>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    let app = create_router(AppState::new(settings));

    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::{aggregator, StubScraper};
    use crate::models::Source;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(stubs: Vec<StubScraper>, output_dir: Option<PathBuf>) -> axum::Router {
        create_router(AppState {
            aggregator: Arc::new(aggregator(stubs)),
            output_dir,
        })
    }

    fn all_ok() -> Vec<StubScraper> {
        vec![
            StubScraper::ok(Source::SquareYards, &["DLF Capital Greens"]),
            StubScraper::ok(Source::NoBroker, &["Hiranandani 2BHK", "Powai Lake View"]),
            StubScraper::ok(Source::Housing, &[]),
        ]
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _) = get(app(all_ok(), None), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_source_endpoint_wraps_records_in_data() {
        let (status, body) = get(app(all_ok(), None), "/nobroker?city=Mumbai&locality=Powai").await;

        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["name"], "Hiranandani 2BHK");
        assert_eq!(data[0]["source"], "nobroker");
    }

    #[tokio::test]
    async fn test_all_endpoint_is_keyed_by_source() {
        let (status, body) = get(app(all_ok(), None), "/all?city=Delhi&locality=Saket&page=1").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("data").is_none());
        assert_eq!(body["squareyard"].as_array().unwrap().len(), 1);
        assert_eq!(body["nobroker"].as_array().unwrap().len(), 2);
        assert_eq!(body["housing"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_scrape_failure_is_500_with_detail() {
        let stubs = vec![StubScraper::failing(Source::Housing, "Failed to launch Chrome browser")];
        let (status, body) = get(app(stubs, None), "/housing?city=Gurgaon&locality=Sector%209").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Failed to launch Chrome browser");
    }

    #[tokio::test]
    async fn test_invalid_queries_are_rejected() {
        let (status, body) = get(app(all_ok(), None), "/housing?city=Gurgaon&locality=Sector&page=0").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("page"));

        let (status, _) = get(app(all_ok(), None), "/housing?city=Gurgaon").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = get(app(all_ok(), None), "/all?city=Gurgaon&locality=Sector&page=two").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_source_is_404() {
        let (status, body) = get(app(all_ok(), None), "/magicbricks?city=Delhi&locality=Saket").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "unknown source 'magicbricks'");
    }

    #[tokio::test]
    async fn test_responses_are_persisted_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = get(
            app(all_ok(), Some(dir.path().to_path_buf())),
            "/squareyard?city=Delhi&locality=Saket",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("squareyard_delhi_saket_"));
    }
}
