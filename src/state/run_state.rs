//! Quota and stop controller shared by every worker of a run
//!
//! `RunState` is the single authority for "should the run continue". All
//! counters are atomics that only ever increase, and the stop transition is a
//! compare-and-set so exactly one caller observes it.

use crate::state::StopReason;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Point-in-time copy of a run's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Detail records handed to the dedup gate
    pub crawled: u64,
    /// Records the store accepted as new
    pub saved: u64,
    /// Records the store already had
    pub duplicates: u64,
    /// Work abandoned because the run had stopped
    pub skipped: u64,
    /// Fetches or extractions that produced nothing
    pub failed: u64,
    /// Detail fetches started (bounded by the crawl limit)
    pub detail_fetches: u64,
}

/// Shared, concurrently-read state of one run
#[derive(Debug)]
pub struct RunState {
    crawled: AtomicU64,
    saved: AtomicU64,
    duplicates: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    detail_fetches: AtomicU64,

    target: u64,
    unlimited: bool,
    max_crawl_limit: u64,

    stopped: AtomicBool,
    stop_reason: OnceLock<StopReason>,
    cancel: CancellationToken,

    started_at: DateTime<Utc>,
    started: Instant,
}

impl RunState {
    /// Creates the state for a fresh run
    ///
    /// A `target` of 0 means unlimited: the run continues until the listing is
    /// exhausted, the crawl limit is hit, or the deadline expires.
    pub fn new(target: u64, max_crawl_limit: u64) -> Self {
        Self {
            crawled: AtomicU64::new(0),
            saved: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            detail_fetches: AtomicU64::new(0),
            target,
            unlimited: target == 0,
            max_crawl_limit,
            stopped: AtomicBool::new(false),
            stop_reason: OnceLock::new(),
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Returns false once the run is stopped, the crawl limit is spent, or
    /// (in limited mode) the target is met
    pub fn should_accept_more_work(&self) -> bool {
        if self.is_stopped() || self.crawl_limit_reached() {
            return false;
        }
        self.unlimited || self.saved.load(Ordering::Acquire) < self.target
    }

    /// Reserves one detail fetch against the crawl limit
    ///
    /// Returns false when the limit is already spent; the caller must not
    /// fetch in that case.
    pub fn try_begin_detail(&self) -> bool {
        self.detail_fetches
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_crawl_limit).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn record_crawled(&self) {
        self.crawled.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_saved(&self) {
        debug_assert!(
            self.saved.load(Ordering::Acquire) < self.crawled.load(Ordering::Acquire),
            "a record must be counted as crawled before it is saved"
        );
        self.saved.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_skipped_since_stopped(&self) {
        self.skipped.fetch_add(1, Ordering::AcqRel);
    }

    /// Adds several skipped items at once (frontier leftovers at drain)
    pub fn record_skipped_many(&self, count: u64) {
        if count > 0 {
            self.skipped.fetch_add(count, Ordering::AcqRel);
        }
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
    }

    /// Evaluates the stop predicate and stops the run if it holds
    ///
    /// Returns true only for the call that performed the transition, so a
    /// single caller logs and triggers shutdown.
    pub fn check_and_maybe_stop(&self) -> bool {
        if !self.unlimited && self.saved.load(Ordering::Acquire) >= self.target {
            return self.stop(StopReason::QuotaReached);
        }
        if self.crawl_limit_reached() {
            return self.stop(StopReason::CrawlLimit);
        }
        false
    }

    /// Stops the run unconditionally; idempotent
    ///
    /// Returns true if this call moved the run from running to stopped.
    pub fn stop(&self, reason: StopReason) -> bool {
        let transitioned = self
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if transitioned {
            let _ = self.stop_reason.set(reason);
            self.cancel.cancel();
        }
        transitioned
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason.get().copied()
    }

    /// Resolves once the run has been stopped by any caller
    pub async fn stopped(&self) {
        self.cancel.cancelled().await
    }

    /// Token cancelled at the stop transition; cloned into workers
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> RunCounters {
        RunCounters {
            crawled: self.crawled.load(Ordering::Acquire),
            saved: self.saved.load(Ordering::Acquire),
            duplicates: self.duplicates.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            detail_fetches: self.detail_fetches.load(Ordering::Acquire),
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    pub fn max_crawl_limit(&self) -> u64 {
        self.max_crawl_limit
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn crawl_limit_reached(&self) -> bool {
        self.detail_fetches.load(Ordering::Acquire) >= self.max_crawl_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_limited_mode_accepts_until_target() {
        let state = RunState::new(2, 100);
        assert!(!state.is_unlimited());
        assert!(state.should_accept_more_work());

        state.record_crawled();
        state.record_saved();
        assert!(state.should_accept_more_work());

        state.record_crawled();
        state.record_saved();
        assert!(!state.should_accept_more_work());
    }

    #[test]
    fn test_zero_target_is_unlimited() {
        let state = RunState::new(0, 100);
        assert!(state.is_unlimited());
        for _ in 0..50 {
            state.record_crawled();
            state.record_saved();
        }
        assert!(state.should_accept_more_work());
        assert!(!state.check_and_maybe_stop());
    }

    #[test]
    fn test_check_and_maybe_stop_transitions_once() {
        let state = RunState::new(1, 100);
        assert!(!state.check_and_maybe_stop());

        state.record_crawled();
        state.record_saved();
        assert!(state.check_and_maybe_stop());
        assert!(!state.check_and_maybe_stop());
        assert!(state.is_stopped());
        assert_eq!(state.stop_reason(), Some(StopReason::QuotaReached));
    }

    #[test]
    fn test_stop_is_sticky_and_keeps_first_reason() {
        let state = RunState::new(5, 100);
        assert!(state.stop(StopReason::Deadline));
        assert!(!state.stop(StopReason::QuotaReached));
        assert!(state.is_stopped());
        assert!(!state.should_accept_more_work());
        assert_eq!(state.stop_reason(), Some(StopReason::Deadline));
    }

    #[test]
    fn test_crawl_limit_wins_over_unlimited() {
        let state = RunState::new(0, 2);
        assert!(state.try_begin_detail());
        assert!(state.try_begin_detail());
        assert!(!state.try_begin_detail());
        assert!(!state.should_accept_more_work());
        assert!(state.check_and_maybe_stop());
        assert_eq!(state.stop_reason(), Some(StopReason::CrawlLimit));
        assert_eq!(state.snapshot().detail_fetches, 2);
    }

    #[test]
    fn test_duplicates_do_not_count_toward_target() {
        let state = RunState::new(1, 100);
        state.record_crawled();
        state.record_duplicate();
        assert!(state.should_accept_more_work());
        assert!(!state.check_and_maybe_stop());
    }

    #[tokio::test]
    async fn test_stopped_future_resolves_after_stop() {
        let state = Arc::new(RunState::new(1, 10));
        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.stopped().await })
        };

        state.record_crawled();
        state.record_saved();
        state.check_and_maybe_stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stop signal not delivered")
            .unwrap();
        assert!(state.cancellation().is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stop_has_single_winner() {
        let state = Arc::new(RunState::new(1, 1000));
        state.record_crawled();
        state.record_saved();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let state = Arc::clone(&state);
            handles.push(tokio::spawn(async move { state.check_and_maybe_stop() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_counters_are_monotonic_under_contention() {
        let state = Arc::new(RunState::new(0, 10_000));

        let mut writers = Vec::new();
        for _ in 0..4 {
            let state = Arc::clone(&state);
            writers.push(tokio::spawn(async move {
                for i in 0..500 {
                    state.record_crawled();
                    if i % 3 == 0 {
                        state.record_duplicate();
                    } else {
                        state.record_saved();
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        let reader = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let mut last = state.snapshot();
                for _ in 0..2000 {
                    let now = state.snapshot();
                    assert!(now.crawled >= last.crawled);
                    assert!(now.saved >= last.saved);
                    assert!(now.duplicates >= last.duplicates);
                    last = now;
                    tokio::task::yield_now().await;
                }
            })
        };

        for writer in writers {
            writer.await.unwrap();
        }
        reader.await.unwrap();

        let done = state.snapshot();
        assert_eq!(done.crawled, 2000);
        assert_eq!(done.saved + done.duplicates, 2000);
        assert!(done.saved <= done.crawled);
    }
}
