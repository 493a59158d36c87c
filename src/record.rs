//! Book records and the normalized dedup key
//!
//! The orchestration core treats a record as an opaque bag of fields; the only
//! thing it derives from one is the dedup key used by the store's uniqueness
//! constraint.

use serde::{Deserialize, Serialize};

/// Human-readable description of the dedup key, reported in run summaries
pub const DEDUP_KEY_LABEL: &str = "title + author";

/// Separator between key components; never appears in extracted text
const KEY_SEPARATOR: char = '\u{1f}';

/// One book as extracted from a detail page
///
/// Every field is optional: detail pages vary, and a missing field is stored
/// as NULL rather than as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publish_date: Option<String>,
    pub original_price: Option<String>,
    pub current_price: Option<String>,
    pub isbn: Option<String>,
    pub rating: Option<String>,
    pub comment_count: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub detail_url: Option<String>,
    pub search_keyword: Option<String>,
}

impl BookRecord {
    /// Returns the normalized title + author key for this record
    pub fn dedup_key(&self) -> String {
        dedup_key(
            self.title.as_deref().unwrap_or_default(),
            self.author.as_deref().unwrap_or_default(),
        )
    }

    /// Number of fields in the schema
    pub const FIELD_COUNT: usize = 13;

    /// Number of populated fields
    pub fn field_count(&self) -> usize {
        [
            &self.title,
            &self.author,
            &self.publisher,
            &self.publish_date,
            &self.original_price,
            &self.current_price,
            &self.isbn,
            &self.rating,
            &self.comment_count,
            &self.description,
            &self.cover_image,
            &self.detail_url,
            &self.search_keyword,
        ]
        .iter()
        .filter(|field| field.is_some())
        .count()
    }
}

/// A record produced by a detail task, tagged with the page it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    pub book: BookRecord,
    pub source_url: String,
}

impl ExtractedRecord {
    pub fn new(book: BookRecord, source_url: impl Into<String>) -> Self {
        Self {
            book,
            source_url: source_url.into(),
        }
    }

    pub fn dedup_key(&self) -> String {
        self.book.dedup_key()
    }
}

/// Builds the normalized dedup key from a title and an author
///
/// Both parts are trimmed, have internal whitespace runs collapsed to one
/// space, and are lowercased, so cosmetic differences between listing and
/// detail pages do not defeat de-duplication.
///
/// # Examples
///
/// ```
/// use bookhound::record::dedup_key;
///
/// assert_eq!(dedup_key("  Rust  in Action ", "Tim McNamara"), dedup_key("rust in action", "TIM MCNAMARA"));
/// ```
pub fn dedup_key(title: &str, author: &str) -> String {
    format!("{}{}{}", normalize_part(title), KEY_SEPARATOR, normalize_part(author))
}

fn normalize_part(part: &str) -> String {
    part.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
