//! Fetch/extract task for one work item
//!
//! A task fetches its page and runs the matching extractor. It never touches
//! run state or the store: it returns a `TaskOutcome` and the dispatcher
//! applies it.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{PageKind, WorkItem};
use crate::extract::{Extractor, ListingEntry};
use crate::record::ExtractedRecord;

/// What a task produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// A listing page: detail links to fan out and the next page, if any
    Listing {
        entries: Vec<ListingEntry>,
        next_page_url: Option<String>,
    },

    /// A detail page; `None` when the page could not be turned into a record
    Detail { record: Option<ExtractedRecord> },

    /// The fetch failed, or a listing page was unusable
    Failure { reason: String },
}

/// Runs one fetch/extract task
///
/// # Arguments
///
/// * `item` - The work item to process
/// * `fetcher` - The fetch primitive
/// * `extractor` - The page extraction rules
/// * `keyword` - Search keyword stamped onto every extracted record
pub async fn run_task(
    item: &WorkItem,
    fetcher: &dyn Fetcher,
    extractor: &dyn Extractor,
    keyword: &str,
) -> TaskOutcome {
    let page = match fetcher.fetch(&item.url).await {
        Ok(page) => page,
        Err(e) => {
            return TaskOutcome::Failure {
                reason: format!("fetch {}: {}", item.url, e),
            }
        }
    };

    match item.kind {
        PageKind::Listing => match extractor.extract_listing(&page.body, &page.final_url) {
            Ok(listing) => TaskOutcome::Listing {
                entries: listing.entries,
                next_page_url: listing.next_page_url,
            },
            Err(e) => TaskOutcome::Failure {
                reason: format!("listing {}: {}", page.final_url, e),
            },
        },
        PageKind::Detail => {
            match extractor.extract_detail(&page.body, &page.final_url, &item.context) {
                Ok(mut book) => {
                    book.search_keyword = Some(keyword.to_string());
                    TaskOutcome::Detail {
                        record: Some(ExtractedRecord::new(book, page.final_url.as_str())),
                    }
                }
                Err(e) => {
                    tracing::warn!("Extraction failed for {}: {}", page.final_url, e);
                    TaskOutcome::Detail { record: None }
                }
            }
        }
    }
}
