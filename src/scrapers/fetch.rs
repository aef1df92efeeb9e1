use crate::config::Settings;
use crate::scrapers::types::RetryPolicy;
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Plain HTTP access to detail pages
pub trait DetailFetcher: Send + Sync {
    /// Body of `url`, or `None` when the server answered with a non-success status
    fn fetch(&self, url: &str) -> Result<Option<String>>;
}

/// Blocking reqwest client with timeout, spoofed user agent and bounded retries.
///
/// Must be built and used off the async runtime (inside `spawn_blocking`).
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, retry })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.user_agent,
            settings.request_timeout(),
            RetryPolicy::new(settings.max_retries, settings.retry_backoff()),
        )
    }

    fn fetch_once(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        // Transient statuses are worth another attempt, the rest are final.
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            bail!("{} returned status {}", url, status);
        }
        if !status.is_success() {
            debug!("{} returned status {}", url, status);
            return Ok(None);
        }

        let body = response.text().context("Failed to read response body")?;
        Ok(Some(body))
    }
}

impl DetailFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Option<String>> {
        self.retry
            .run(&format!("fetch of {}", url), || self.fetch_once(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(retries: u32) -> HttpFetcher {
        HttpFetcher::new(
            "property-scout-test",
            Duration::from_secs(5),
            RetryPolicy::new(retries, Duration::ZERO),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/detail/1"))
            .and(header("user-agent", "property-scout-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let url = format!("{}/detail/1", server.uri());
        let body = tokio::task::spawn_blocking(move || fetcher(0).fetch(&url))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(body.as_deref(), Some("<html>ok</html>"));
    }

    #[tokio::test]
    async fn test_not_found_is_absent_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/gone", server.uri());
        let body = tokio::task::spawn_blocking(move || fetcher(2).fetch(&url))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(body, None);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_surface() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let url = format!("{}/flaky", server.uri());
        let result = tokio::task::spawn_blocking(move || fetcher(2).fetch(&url))
            .await
            .unwrap();

        assert!(result.is_err());
    }
}
