use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::scrapers::types::DEFAULT_USER_AGENT;

/// Runtime settings, read from flags or the environment (`.env` is honoured)
#[derive(Debug, Clone, Parser)]
#[command(name = "property-scout", about = "Property listing scraper API")]
pub struct Settings {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Google Places API key, needed to build NoBroker search URLs
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// Records per logical page, applied to every source
    #[arg(long, env = "PAGE_SIZE", default_value_t = 10)]
    pub page_size: usize,

    /// Pause after each scroll so lazy content can load
    #[arg(long, env = "SCROLL_PAUSE_MS", default_value_t = 2000)]
    pub scroll_pause_ms: u64,

    /// Wait after navigation and after forcing lazy images
    #[arg(long, env = "SETTLE_MS", default_value_t = 2000)]
    pub settle_ms: u64,

    /// Scroll passes per Housing.com results page
    #[arg(long, env = "HOUSING_SCROLL_PASSES", default_value_t = 10)]
    pub housing_scroll_passes: u32,

    /// Upper bound on scrolls for continuously scrolled sources
    #[arg(long, env = "MAX_SCROLLS", default_value_t = 200)]
    pub max_scrolls: u32,

    /// Upper bound on site pages visited per run
    #[arg(long, env = "MAX_SITE_PAGES", default_value_t = 25)]
    pub max_site_pages: u32,

    /// Timeout for a single HTTP request or browser operation
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Timeout for a whole single-source run
    #[arg(long, env = "RUN_TIMEOUT_SECS", default_value_t = 600)]
    pub run_timeout_secs: u64,

    /// Retries after the first failed navigation or detail fetch
    #[arg(long, env = "MAX_RETRIES", default_value_t = 2)]
    pub max_retries: u32,

    /// Base backoff between retries, doubled on each attempt
    #[arg(long, env = "RETRY_BACKOFF_MS", default_value_t = 500)]
    pub retry_backoff_ms: u64,

    /// User agent sent by the browser and the HTTP client
    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Run Chrome headless
    #[arg(long, env = "HEADLESS", default_value_t = true, action = ArgAction::Set)]
    pub headless: bool,

    /// Directory to write every response to as JSON; disabled when unset
    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

impl Settings {
    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::parse_from(["property-scout"])
    }
}
