//! In-run work queue
//!
//! The frontier holds pending listing and detail pages for one run. Listing
//! pages are handed out ahead of detail pages, so the single pagination chain
//! keeps advancing while detail links fan out breadth-first. Within a kind the
//! order is FIFO by discovery.
//!
//! Every push consults the run's stop controller under the frontier lock; once
//! the run stops accepting work nothing new enters the queue.

use crate::extract::PageContext;
use crate::state::RunState;
use crate::url::normalize_url;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use url::Url;

/// Kind of page a work item points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Listing,
    Detail,
}

/// One unit of frontier work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: Url,
    pub kind: PageKind,
    /// Fields known from the parent page
    pub context: PageContext,
}

impl WorkItem {
    pub fn listing(url: Url) -> Self {
        Self {
            url,
            kind: PageKind::Listing,
            context: PageContext::new(),
        }
    }

    pub fn detail(url: Url, context: PageContext) -> Self {
        Self {
            url,
            kind: PageKind::Detail,
            context,
        }
    }
}

#[derive(Debug, Default)]
struct Queues {
    listing: VecDeque<WorkItem>,
    detail: VecDeque<WorkItem>,
    seen: HashSet<String>,
    in_flight: usize,
}

impl Queues {
    fn pop(&mut self) -> Option<WorkItem> {
        self.listing.pop_front().or_else(|| self.detail.pop_front())
    }

    fn len(&self) -> usize {
        self.listing.len() + self.detail.len()
    }
}

/// Shared work queue for one run
#[derive(Debug)]
pub struct Frontier {
    queues: Mutex<Queues>,
    notify: Notify,
    state: Arc<RunState>,
}

impl Frontier {
    pub fn new(state: Arc<RunState>) -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            notify: Notify::new(),
            state,
        }
    }

    /// Appends an item unless the run has stopped or the URL was already queued
    ///
    /// # Returns
    ///
    /// `true` if the item was queued; rejected items are silently dropped
    pub fn push(&self, item: WorkItem) -> bool {
        let key = normalize_url(item.url.as_str())
            .map(|url| url.to_string())
            .unwrap_or_else(|_| item.url.to_string());

        {
            let mut queues = self.lock();
            if !self.state.should_accept_more_work() {
                return false;
            }
            if !queues.seen.insert(key) {
                return false;
            }
            match item.kind {
                PageKind::Listing => queues.listing.push_back(item),
                PageKind::Detail => queues.detail.push_back(item),
            }
        }

        self.notify.notify_waiters();
        true
    }

    /// Takes the next item, waiting while other workers may still add work
    ///
    /// Returns `None` when the queue is empty and no item is in flight
    /// (exhausted), or when the run is stopped while waiting. Every item
    /// returned must be followed by exactly one `task_done` call.
    pub async fn next(&self) -> Option<WorkItem> {
        let cancel = self.state.cancellation();

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut queues = self.lock();
                if let Some(item) = queues.pop() {
                    queues.in_flight += 1;
                    return Some(item);
                }
                if queues.in_flight == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Marks an item returned by `next` as fully processed
    pub fn task_done(&self) {
        {
            let mut queues = self.lock();
            debug_assert!(queues.in_flight > 0, "task_done without a matching next");
            queues.in_flight = queues.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Removes every pending item and returns how many there were
    pub fn drain_pending(&self) -> usize {
        let mut queues = self.lock();
        let pending = queues.len();
        queues.listing.clear();
        queues.detail.clear();
        pending
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of distinct URLs ever accepted
    pub fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
