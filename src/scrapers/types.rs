use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Desktop Chrome user agent, sent by both the browser and the HTTP client
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Search parameters for one paginated scrape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// City to search in, free text
    pub city: String,
    /// Locality within the city, free text
    pub locality: String,
    /// 1-based logical page
    pub page: usize,
}

impl SearchQuery {
    pub fn new(city: impl Into<String>, locality: impl Into<String>, page: usize) -> Self {
        Self {
            city: city.into(),
            locality: locality.into(),
            page: page.max(1),
        }
    }

    /// Number of records that must be accumulated to fill this page,
    /// `None` when the page lies past any addressable record
    pub fn desired_count(&self, page_size: usize) -> Option<usize> {
        self.window(page_size).map(|(_, end)| end)
    }

    /// Bounds of this page inside the accumulated record list, `None` on overflow
    pub fn window(&self, page_size: usize) -> Option<(usize, usize)> {
        let start = self.page.saturating_sub(1).checked_mul(page_size)?;
        let end = start.checked_add(page_size)?;
        Some((start, end))
    }
}

/// Lowercases a search term and replaces whitespace runs with `separator`
pub fn slugify(term: &str, separator: char) -> String {
    term.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

/// Stop signal shared between an async caller and the blocking worker it spawned
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Errors once cancelled, so `?` unwinds the worker and releases its session
    pub fn check(&self, what: &str) -> anyhow::Result<()> {
        if self.is_cancelled() {
            anyhow::bail!("{} cancelled", what);
        }
        Ok(())
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self { max_retries, backoff }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Runs `op` until it succeeds or retries run out; returns the last error
    pub fn run<T, F>(&self, what: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> anyhow::Result<T>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries => {
                    let delay = self.backoff * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        "{} failed (attempt {}/{}): {:#}; retrying in {:?}",
                        what,
                        attempt,
                        self.max_retries + 1,
                        err,
                        delay
                    );
                    thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
