//! Small helpers for fault-tolerant field extraction.
//!
//! Every lookup returns `Option`: a missing element, attribute or blank text
//! is an absent value, never an error.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Selector};
use url::Url;

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {}", css, e))
}

/// Whitespace-normalized text of an element, `None` when blank
pub fn element_text(element: ElementRef) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Text of the first descendant matching `selector`
pub fn first_text(element: ElementRef, selector: &Selector) -> Option<String> {
    element.select(selector).next().and_then(element_text)
}

/// Text of the `index`-th descendant matching `selector`
pub fn nth_text(element: ElementRef, selector: &Selector, index: usize) -> Option<String> {
    element.select(selector).nth(index).and_then(element_text)
}

/// Non-blank attribute of the first descendant matching `selector`
pub fn first_attr(element: ElementRef, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| non_blank(el.value().attr(attr)))
}

pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve a possibly relative (or protocol-relative) link against `origin`
pub fn absolute_url(origin: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(origin).ok()?;
    base.join(href).ok().map(String::from)
}

/// Parse a coordinate that may arrive as text with stray whitespace
pub fn parse_coordinate(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
