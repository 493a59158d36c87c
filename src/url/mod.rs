//! URL handling for Bookhound
//!
//! Normalization (the frontier's de-duplication key), link resolution for
//! extracted hrefs, and expansion of the listing URL template.

mod normalize;

pub use normalize::normalize_url;

use crate::UrlError;
use url::{form_urlencoded, Url};

/// Resolves an href found on a page to an absolute http(s) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - anything that does not resolve to http or https
///
/// Protocol-relative links (`//host/path`) take the page's scheme.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

/// Builds the first listing URL for a keyword from a `{keyword}` template
///
/// The keyword is form-encoded before substitution, so spaces and non-ASCII
/// search terms are safe.
///
/// # Examples
///
/// ```
/// use bookhound::url::build_listing_url;
///
/// let url = build_listing_url("https://example.com/search?key={keyword}", "rust lang").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/search?key=rust+lang");
/// ```
pub fn build_listing_url(template: &str, keyword: &str) -> Result<Url, UrlError> {
    if !template.contains("{keyword}") {
        return Err(UrlError::MissingPlaceholder(template.to_string()));
    }

    let encoded: String = form_urlencoded::byte_serialize(keyword.trim().as_bytes()).collect();
    let expanded = template.replace("{keyword}", &encoded);

    let url = Url::parse(&expanded).map_err(|e| UrlError::Parse(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    Ok(url)
}
