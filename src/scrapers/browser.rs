use crate::config::Settings;
use crate::scrapers::types::RetryPolicy;
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";
const SCROLL_HEIGHT: &str = "document.body.scrollHeight";

/// Makes lazily loaded images adopt their real source before the DOM is captured
const FORCE_LAZY_IMAGES: &str = r#"
    document.querySelectorAll('img').forEach(img => {
        const lazy = img.getAttribute('data-src');
        if (lazy) img.setAttribute('src', lazy);
    });
"#;

/// A live browser tab the pipeline can drive
pub trait BrowserSession: Send {
    fn navigate(&mut self, url: &str) -> Result<()>;

    fn execute_script(&mut self, script: &str) -> Result<Option<serde_json::Value>>;

    /// Current rendered DOM as HTML
    fn document(&mut self) -> Result<String>;

    fn scroll_height(&mut self) -> Result<u64> {
        let value = self.execute_script(SCROLL_HEIGHT)?;
        Ok(value.and_then(|v| v.as_u64()).unwrap_or(0))
    }

    fn close(&mut self) -> Result<()>;
}

/// Hands out fresh browser sessions, one per scraping run
pub trait BrowserProvider: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Closes the wrapped session when dropped, whatever path the run took
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self { session }
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(err) = self.session.close() {
            warn!("Failed to close browser session: {:#}", err);
        }
    }
}

/// Launches a dedicated headless Chrome per session
pub struct ChromeProvider {
    headless: bool,
    user_agent: String,
    timeout: Duration,
}

impl ChromeProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            headless: settings.headless,
            user_agent: settings.user_agent.clone(),
            timeout: settings.request_timeout(),
        }
    }
}

impl BrowserProvider for ChromeProvider {
    fn acquire(&self) -> Result<Box<dyn BrowserSession>> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(false)
            .args(vec![OsStr::new("--disable-dev-shm-usage")])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(self.timeout);
        tab.set_user_agent(&self.user_agent, Some("en-US,en"), None)
            .context("Failed to set user agent")?;

        Ok(Box::new(ChromeSession { browser: Some(browser), tab }))
    }
}

/// Chrome process plus the single tab the run works in
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?
            .wait_until_navigated()
            .with_context(|| format!("Navigation to {} did not complete", url))?;
        Ok(())
    }

    fn execute_script(&mut self, script: &str) -> Result<Option<serde_json::Value>> {
        let result = self
            .tab
            .evaluate(script, false)
            .context("Failed to evaluate script")?;
        Ok(result.value)
    }

    fn document(&mut self) -> Result<String> {
        self.tab.get_content().context("Failed to read page content")
    }

    fn close(&mut self) -> Result<()> {
        if self.browser.is_none() {
            return Ok(());
        }
        let closed = self.tab.close(true);
        // Dropping the browser kills the Chrome process.
        self.browser.take();
        closed.map(|_| ()).context("Failed to close tab")
    }
}

/// How a listing page has to be driven before its DOM is useful
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub scroll_pause: Duration,
    pub settle: Duration,
    pub retry: RetryPolicy,
}

impl RenderOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            scroll_pause: settings.scroll_pause(),
            settle: settings.settle(),
            retry: RetryPolicy::new(settings.max_retries, settings.retry_backoff()),
        }
    }

    /// No waiting at all, for fakes
    pub fn immediate() -> Self {
        Self {
            scroll_pause: Duration::ZERO,
            settle: Duration::ZERO,
            retry: RetryPolicy::none(),
        }
    }
}

/// Turns a URL into a fully rendered document
#[derive(Clone)]
pub struct PageRenderer {
    provider: Arc<dyn BrowserProvider>,
    options: RenderOptions,
}

impl PageRenderer {
    pub fn new(provider: Arc<dyn BrowserProvider>, options: RenderOptions) -> Self {
        Self { provider, options }
    }

    /// Acquire a session that is released when the guard goes out of scope
    pub fn acquire(&self) -> Result<SessionGuard> {
        let session = self
            .provider
            .acquire()
            .context("Failed to acquire browser session")?;
        Ok(SessionGuard::new(session))
    }

    /// Navigate with bounded retries, then let the page settle
    pub fn open(&self, session: &mut dyn BrowserSession, url: &str) -> Result<()> {
        self.options
            .retry
            .run(&format!("navigation to {}", url), || session.navigate(url))?;
        thread::sleep(self.options.settle);
        Ok(())
    }

    /// Scroll once and return the content height after the pause
    pub fn scroll_to_bottom(&self, session: &mut dyn BrowserSession) -> Result<u64> {
        session.execute_script(SCROLL_TO_BOTTOM)?;
        thread::sleep(self.options.scroll_pause);
        session.scroll_height()
    }

    /// Rewrite `data-src` images, then capture the DOM
    pub fn capture(&self, session: &mut dyn BrowserSession) -> Result<String> {
        if let Err(err) = session.execute_script(FORCE_LAZY_IMAGES) {
            debug!("Could not force lazy images: {:#}", err);
        }
        thread::sleep(self.options.settle);
        session.document()
    }

    /// Full render: open, scroll `scroll_passes` times, force lazy images, capture
    pub fn render(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        scroll_passes: u32,
    ) -> Result<String> {
        self.open(session, url)?;
        for _ in 0..scroll_passes {
            self.scroll_to_bottom(session)?;
        }
        let html = self.capture(session)?;
        debug!("Rendered {} ({} bytes)", url, html.len());
        Ok(html)
    }

    /// Render a single page in a session of its own
    pub fn render_once(&self, url: &str, scroll_passes: u32) -> Result<String> {
        let mut session = self.acquire()?;
        self.render(&mut *session, url, scroll_passes)
    }
}
