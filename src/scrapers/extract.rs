//! Field extraction from a fetched homepage.
//!
//! | Field | Elements | Value |
//! |-------|----------|-------|
//! | `links` | every `<a>` | `href`, or `None` when missing |
//! | `titles` | every `<title>` | concatenated text |
//! | `descriptions` | every `<meta>` with `name` exactly `description` | `content` |
//!
//! `<meta>` is a void element with no text, so descriptions come from its
//! `content` attribute rather than element text, which would always be empty.
//!
//! The HTML parser recovers from malformed markup on its own, so the only
//! parse failures are bodies that are not text at all.

use super::client::FetchedPage;
use crate::error::ParseError;
use crate::models::SourceRecord;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

const LINK_SELECTOR: &str = "a";
const TITLE_SELECTOR: &str = "title";
const META_SELECTOR: &str = "meta[name]";

struct Selectors {
    link: Selector,
    title: Selector,
    meta: Selector,
}

fn parse_selector(selector: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::Selector {
        selector,
        reason: e.to_string(),
    })
}

impl Selectors {
    fn new() -> Result<Self, ParseError> {
        Ok(Self {
            link: parse_selector(LINK_SELECTOR)?,
            title: parse_selector(TITLE_SELECTOR)?,
            meta: parse_selector(META_SELECTOR)?,
        })
    }
}

/// Reject bodies whose declared content type is not a text document.
fn ensure_text(content_type: Option<&str>) -> Result<(), ParseError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime.starts_with("text/") || mime == "application/xhtml+xml" || mime.is_empty() {
        Ok(())
    } else {
        Err(ParseError::NotText(content_type.to_string()))
    }
}

/// Extract links, titles and descriptions from `page` into a record for `source`.
#[instrument(level = "debug", skip(page), fields(bytes = page.body.len()))]
pub fn extract_record(source: &str, page: &FetchedPage) -> Result<SourceRecord, ParseError> {
    ensure_text(page.content_type.as_deref())?;
    let selectors = Selectors::new()?;

    let html = String::from_utf8_lossy(&page.body);
    let document = Html::parse_document(&html);
    if !document.errors.is_empty() {
        debug!(count = document.errors.len(), "Parser recovered from markup errors");
    }

    let links = document
        .select(&selectors.link)
        .map(|a| a.value().attr("href").map(str::to_string))
        .collect();
    let titles = document
        .select(&selectors.title)
        .map(|t| t.text().collect::<String>())
        .collect();
    let descriptions = document
        .select(&selectors.meta)
        .filter(|m| m.value().attr("name") == Some("description"))
        .map(|m| m.value().attr("content").unwrap_or_default().to_string())
        .collect();

    Ok(SourceRecord {
        source: source.to_string(),
        links,
        titles,
        descriptions,
    })
}
