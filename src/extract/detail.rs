//! Detail page rules
//!
//! Each field tries its selectors in order and takes the first non-empty hit.
//! Title and current price fall back to what the listing page showed.

use super::{element_text, first_attr, first_text, selector};
use super::{ExtractError, PageContext, CONTEXT_PRICE, CONTEXT_TITLE};
use crate::record::BookRecord;
use crate::url::resolve_link;
use scraper::{ElementRef, Html};
use url::Url;

const TITLE_SELECTORS: &[&str] = &["div.name_info h1", "h1.title"];
const AUTHOR_SELECTORS: &[&str] = &["span#author a", "a[name=itemlist-author]", "p.author a"];
const PUBLISHER_SELECTORS: &[&str] = &["span#publisher a", "a[name=P_cbs]"];
const PUBLISH_DATE_SELECTORS: &[&str] = &["span#publish_time", "span[name=P_date]"];
const ORIGINAL_PRICE_SELECTORS: &[&str] = &["span#original-price", "p.price span.price_n"];
const CURRENT_PRICE_SELECTORS: &[&str] = &["span#dd-price"];
const DESCRIPTION_SELECTORS: &[&str] = &[
    "div.descrip",
    "div#content div.describe_detail",
    "div.book_intro",
];
const RATING_SELECTORS: &[&str] = &["span.star_gray", "div.star", "span.score"];
const COMMENT_COUNT_SELECTORS: &[&str] = &["span#comm_num_down", "a#comm_num"];
const COVER_SELECTORS: &[&str] = &["img#largePic", "div.pic_box img", "img#main-img"];

pub(super) fn extract(
    document: &Html,
    page_url: &Url,
    context: &PageContext,
) -> Result<BookRecord, ExtractError> {
    let root = document.root_element();

    let title = first_attr(root, &TITLE_SELECTORS[..1], "title")?
        .or(first_text(root, TITLE_SELECTORS)?)
        .or_else(|| context.get(CONTEXT_TITLE).cloned())
        .ok_or_else(|| ExtractError::MissingTitle(page_url.to_string()))?;

    let current_price = first_text(root, CURRENT_PRICE_SELECTORS)?
        .or_else(|| context.get(CONTEXT_PRICE).cloned());

    let cover_image = first_attr(root, COVER_SELECTORS, "src")?
        .and_then(|src| resolve_link(&src, page_url));

    Ok(BookRecord {
        title: Some(title),
        author: first_text(root, AUTHOR_SELECTORS)?,
        publisher: first_text(root, PUBLISHER_SELECTORS)?,
        publish_date: first_text(root, PUBLISH_DATE_SELECTORS)?,
        original_price: first_text(root, ORIGINAL_PRICE_SELECTORS)?,
        current_price,
        isbn: extract_isbn(root)?,
        rating: first_text(root, RATING_SELECTORS)?,
        comment_count: first_text(root, COMMENT_COUNT_SELECTORS)?,
        description: first_text(root, DESCRIPTION_SELECTORS)?,
        cover_image,
        detail_url: Some(page_url.to_string()),
        search_keyword: None,
    })
}

/// Finds the product-info line mentioning ISBN and strips its label
fn extract_isbn(root: ElementRef<'_>) -> Result<Option<String>, ExtractError> {
    let items = selector("li")?;
    let isbn = root
        .select(&items)
        .filter_map(element_text)
        .find(|text| text.contains("ISBN"))
        .and_then(|text| {
            let (_, rest) = text.split_once("ISBN")?;
            let value = rest.trim_start_matches(['：', ':']).trim();
            (!value.is_empty()).then(|| value.to_string())
        });
    Ok(isbn)
}
