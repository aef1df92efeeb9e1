//! In-memory browser used to drive the pipeline in tests.

use crate::scrapers::browser::{BrowserProvider, BrowserSession};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A page the fake browser can serve; each scroll advances to the next state
#[derive(Debug, Clone)]
pub struct FakePage {
    pub url: String,
    pub states: Vec<(u64, String)>,
}

impl FakePage {
    pub fn new(url: &str, html: &str) -> Self {
        Self::scrolling(url, vec![(1000, html.to_string())])
    }

    pub fn scrolling(url: &str, states: Vec<(u64, String)>) -> Self {
        Self {
            url: url.to_string(),
            states,
        }
    }
}

#[derive(Default)]
struct Log {
    navigations: Vec<String>,
    scripts: Vec<String>,
    acquired: usize,
    closed: usize,
    failing_navigations: usize,
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    pages: Arc<HashMap<String, FakePage>>,
    log: Arc<Mutex<Log>>,
}

impl FakeBrowser {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().map(|p| (p.url.clone(), p)).collect()),
            log: Arc::default(),
        }
    }

    /// The next `count` navigations fail before any succeeds
    pub fn failing_navigations(self, count: usize) -> Self {
        self.log.lock().unwrap().failing_navigations = count;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.log.lock().unwrap().navigations.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.log.lock().unwrap().scripts.clone()
    }

    pub fn acquired_sessions(&self) -> usize {
        self.log.lock().unwrap().acquired
    }

    pub fn closed_sessions(&self) -> usize {
        self.log.lock().unwrap().closed
    }
}

impl BrowserProvider for FakeBrowser {
    fn acquire(&self) -> Result<Box<dyn BrowserSession>> {
        self.log.lock().unwrap().acquired += 1;
        Ok(Box::new(FakeSession {
            browser: self.clone(),
            current: None,
            state: 0,
        }))
    }
}

struct FakeSession {
    browser: FakeBrowser,
    current: Option<String>,
    state: usize,
}

impl FakeSession {
    fn page(&self) -> Result<&FakePage> {
        self.current
            .as_ref()
            .and_then(|url| self.browser.pages.get(url))
            .ok_or_else(|| anyhow!("no page loaded"))
    }
}

impl BrowserSession for FakeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let mut log = self.browser.log.lock().unwrap();
        log.navigations.push(url.to_string());
        if log.failing_navigations > 0 {
            log.failing_navigations -= 1;
            return Err(anyhow!("navigation to {} timed out", url));
        }
        if !self.browser.pages.contains_key(url) {
            return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED at {}", url));
        }
        self.current = Some(url.to_string());
        self.state = 0;
        Ok(())
    }

    fn execute_script(&mut self, script: &str) -> Result<Option<serde_json::Value>> {
        self.browser.log.lock().unwrap().scripts.push(script.to_string());
        if script.contains("scrollTo") {
            let last = self.page()?.states.len().saturating_sub(1);
            self.state = (self.state + 1).min(last);
            return Ok(None);
        }
        if script.contains("scrollHeight") {
            let height = self.page()?.states[self.state].0;
            return Ok(Some(serde_json::json!(height)));
        }
        Ok(None)
    }

    fn document(&mut self) -> Result<String> {
        Ok(self.page()?.states[self.state].1.clone())
    }

    fn close(&mut self) -> Result<()> {
        self.browser.log.lock().unwrap().closed += 1;
        Ok(())
    }
}
