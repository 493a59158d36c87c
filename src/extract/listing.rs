//! Listing page rules
//!
//! The search site has served three list layouts over time; the first layout
//! that yields any items wins.

use super::{element_attr, first_attr, first_text, selector};
use super::{ExtractError, ListingEntry, ListingPage};
use crate::url::resolve_link;
use scraper::Html;
use url::Url;

const ITEM_SELECTORS: &[&str] = &[
    "ul.bigimg li",
    "ul#component_59 li",
    "div#search_nature_rg li.line1",
];

const LINK_SELECTORS: &[&str] = &["a.pic", "p.name a", "a[name=itemlist-title]"];

const PRICE_SELECTORS: &[&str] = &["p.price span.search_now_price", "span.search_now_price"];

const NEXT_PAGE_SELECTOR: &str = "li.next a";

pub(super) fn extract(document: &Html, page_url: &Url) -> Result<ListingPage, ExtractError> {
    let mut entries = Vec::new();

    for css in ITEM_SELECTORS {
        let items = selector(css)?;
        for item in document.select(&items) {
            let Some(href) = first_attr(item, LINK_SELECTORS, "href")? else {
                continue;
            };
            let Some(detail_url) = resolve_link(&href, page_url) else {
                continue;
            };

            let title = match first_attr(item, LINK_SELECTORS, "title")? {
                Some(title) => Some(title),
                None => first_text(item, LINK_SELECTORS)?,
            };
            let price = first_text(item, PRICE_SELECTORS)?;

            entries.push(ListingEntry {
                detail_url,
                title,
                price,
            });
        }

        if !entries.is_empty() {
            break;
        }
    }

    let next = selector(NEXT_PAGE_SELECTOR)?;
    let next_page_url = document
        .select(&next)
        .filter_map(|link| element_attr(link, "href"))
        .find_map(|href| resolve_link(&href, page_url))
        .filter(|url| url != page_url.as_str());

    tracing::debug!(
        "Listing {} yielded {} entries (next page: {})",
        page_url,
        entries.len(),
        next_page_url.is_some()
    );

    Ok(ListingPage {
        entries,
        next_page_url,
    })
}
