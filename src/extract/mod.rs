//! Page extraction for listing and detail pages
//!
//! Extraction is a pure function of one page body: it never fetches, never
//! touches run state, and never talks to the store. The crawler hands it a
//! body and gets back either the detail links of a listing page or one
//! `BookRecord`.
//!
//! # Components
//!
//! - `Extractor`: the seam the crawler calls through
//! - `BookPageExtractor`: CSS-selector rules for the book listing site

mod detail;
mod listing;

use crate::record::BookRecord;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Fields known from a parent page, forwarded to the child task as fallbacks
pub type PageContext = BTreeMap<String, String>;

/// Context key for a title glimpsed on the listing page
pub const CONTEXT_TITLE: &str = "title";

/// Context key for a price glimpsed on the listing page
pub const CONTEXT_PRICE: &str = "price";

/// Errors raised while extracting a page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("No title found on detail page {0}")]
    MissingTitle(String),
}

/// One detail link discovered on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Absolute URL of the detail page
    pub detail_url: String,

    /// Title shown on the listing, if any
    pub title: Option<String>,

    /// Price shown on the listing, if any
    pub price: Option<String>,
}

impl ListingEntry {
    /// Builds the context handed to the detail task for this entry
    pub fn context(&self) -> PageContext {
        let mut context = PageContext::new();
        if let Some(title) = &self.title {
            context.insert(CONTEXT_TITLE.to_string(), title.clone());
        }
        if let Some(price) = &self.price {
            context.insert(CONTEXT_PRICE.to_string(), price.clone());
        }
        context
    }
}

/// Everything extracted from one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Detail links in page order
    pub entries: Vec<ListingEntry>,

    /// Absolute URL of the next listing page, if the page links one
    pub next_page_url: Option<String>,
}

/// Extraction collaborator used by crawl tasks
pub trait Extractor: Send + Sync {
    /// Extracts detail links and the next-page link from a listing page
    fn extract_listing(&self, body: &str, page_url: &Url) -> Result<ListingPage, ExtractError>;

    /// Extracts one record from a detail page
    ///
    /// `context` carries fields already seen on the listing page; they fill in
    /// for fields the detail page lacks.
    fn extract_detail(
        &self,
        body: &str,
        page_url: &Url,
        context: &PageContext,
    ) -> Result<BookRecord, ExtractError>;
}

/// Selector rules for the book search site
#[derive(Debug, Clone, Copy, Default)]
pub struct BookPageExtractor;

impl BookPageExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for BookPageExtractor {
    fn extract_listing(&self, body: &str, page_url: &Url) -> Result<ListingPage, ExtractError> {
        let document = Html::parse_document(body);
        listing::extract(&document, page_url)
    }

    fn extract_detail(
        &self,
        body: &str,
        page_url: &Url,
        context: &PageContext,
    ) -> Result<BookRecord, ExtractError> {
        let document = Html::parse_document(body);
        detail::extract(&document, page_url, context)
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css.to_string()))
}

/// Collapses whitespace runs and trims; empty text becomes None
fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    clean_text(&element.text().collect::<String>())
}

fn element_attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element.value().attr(name).and_then(clean_text)
}

/// Text of the first element matching any selector, in order
fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Result<Option<String>, ExtractError> {
    for css in selectors {
        let sel = selector(css)?;
        if let Some(text) = scope.select(&sel).find_map(element_text) {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Attribute of the first element matching any selector, in order
fn first_attr(
    scope: ElementRef<'_>,
    selectors: &[&str],
    attr: &str,
) -> Result<Option<String>, ExtractError> {
    for css in selectors {
        let sel = selector(css)?;
        if let Some(value) = scope.select(&sel).find_map(|el| element_attr(el, attr)) {
            return Ok(Some(value));
        }
    }
    Ok(None)
}
