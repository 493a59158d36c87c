//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the bookstore and drive whole
//! runs through the supervisor: seeding, pagination, quota stop, drain,
//! and the summary.

use bookhound::config::{Config, StoreConfig};
use bookhound::crawler::{crawl, RunRequest, Supervisor};
use bookhound::storage::{open_gate, open_storage, BookStore, DedupGate, MemoryBookStore};
use bookhound::{HoundError, StopReason};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration whose search URL points at the mock server
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.source.listing_url = format!("{}/search?key={{keyword}}", base_url);
    config.fetch.retries = 0;
    config.fetch.timeout_secs = 10;
    config.crawler.deadline_secs = 20;
    config.crawler.grace_period_secs = 5;
    config.store.enabled = false;
    config
}

fn request(keyword: &str, target: u64, concurrency: u32) -> RunRequest {
    RunRequest {
        keyword: keyword.to_string(),
        target,
        proxy: None,
        concurrency,
    }
}

fn memory_gate() -> DedupGate {
    DedupGate::new(Arc::new(MemoryBookStore::new()))
}

/// Renders a search results page linking to `/book/{id}` for each id
fn listing_html(base_url: &str, ids: &[u32], next: Option<&str>) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<li><a class="pic" href="{}/book/{}" title="Listing {}">cover</a>
                   <p class="price"><span class="search_now_price">&yen;{}.00</span></p></li>"#,
                base_url, id, id, id
            )
        })
        .collect();
    let paging = next
        .map(|href| {
            format!(
                r#"<ul class="paging"><li class="next"><a href="{}">next</a></li></ul>"#,
                href
            )
        })
        .unwrap_or_default();

    format!(
        r#"<html><body><ul class="bigimg">{}</ul>{}</body></html>"#,
        items, paging
    )
}

fn detail_html(title: &str, author: &str) -> String {
    format!(
        r#"<html><body>
        <div class="name_info"><h1 title="{title}">{title}</h1></div>
        <span id="author"><a>{author}</a></span>
        <span id="publisher"><a>Example Press</a></span>
        <span id="dd-price">&yen;42.00</span>
        <ul><li>ISBN：9780000000000</li></ul>
        </body></html>"#
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount_first_page(server: &MockServer, keyword: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("key", keyword))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}

/// Mounts `/book/{id}` with a distinct title/author per id
async fn mount_unique_details(server: &MockServer, ids: &[u32]) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/book/{}", id)))
            .respond_with(html(detail_html(
                &format!("Book {}", id),
                &format!("Author {}", id),
            )))
            .mount(server)
            .await;
    }
}

async fn mount_slow_details(server: &MockServer, ids: &[u32], delay: Duration) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/book/{}", id)))
            .respond_with(
                html(detail_html(&format!("Book {}", id), "Slow Author")).set_delay(delay),
            )
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_quota_reached_across_two_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(
        &mock_server,
        "rust",
        listing_html(&base_url, &[1, 2, 3, 4], Some("/list/2")),
    )
    .await;
    mount_page(&mock_server, "/list/2", listing_html(&base_url, &[5, 6, 7, 8], None)).await;
    mount_unique_details(&mock_server, &[1, 2, 3, 4, 5, 6, 7, 8]).await;

    let supervisor = Supervisor::new(create_test_config(&base_url), memory_gate());
    let summary = supervisor.run(request("rust", 5, 1)).await.unwrap();

    assert_eq!(summary.total_saved, 5);
    assert_eq!(summary.total_crawled, 5);
    assert_eq!(summary.total_duplicates, 0);
    assert_eq!(summary.total_skipped, 3, "remaining detail pages are abandoned");
    assert_eq!(summary.stop_reason, Some(StopReason::QuotaReached));
    assert_eq!(summary.books.len(), 5);
    assert!(summary
        .books
        .iter()
        .all(|b| b.search_keyword.as_deref() == Some("rust")));
    assert_eq!(summary.books[0].isbn.as_deref(), Some("9780000000000"));
}

#[tokio::test]
async fn test_quota_overshoot_is_bounded_by_concurrency() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let ids: Vec<u32> = (1..=12).collect();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &ids, None)).await;
    mount_unique_details(&mock_server, &ids).await;

    let concurrency = 4;
    let target = 5;
    let supervisor = Supervisor::new(create_test_config(&base_url), memory_gate());
    let summary = supervisor
        .run(request("rust", target, concurrency))
        .await
        .unwrap();

    assert!(summary.total_saved >= target);
    assert!(summary.total_saved <= target + (concurrency as u64 - 1));
    assert!(summary.total_saved <= summary.total_crawled);
    assert_eq!(summary.stop_reason, Some(StopReason::QuotaReached));
    assert_eq!(
        summary.total_crawled + summary.total_skipped,
        ids.len() as u64,
        "every detail page is either crawled or skipped"
    );
}

#[tokio::test]
async fn test_duplicates_exhaust_frontier_without_hanging() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let ids: Vec<u32> = (1..=6).collect();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &ids, None)).await;
    for id in &ids {
        // Two distinct books, each listed three times under different URLs
        let (title, author) = if id % 2 == 0 {
            ("Programming Rust", "Jim Blandy")
        } else {
            ("Rust in Action", "Tim McNamara")
        };
        Mock::given(method("GET"))
            .and(path(format!("/book/{}", id)))
            .respond_with(html(detail_html(title, author)))
            .mount(&mock_server)
            .await;
    }

    let supervisor = Supervisor::new(create_test_config(&base_url), memory_gate());
    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        supervisor.run(request("rust", 3, 2)),
    )
    .await
    .expect("run should not hang")
    .unwrap();

    assert_eq!(summary.total_saved, 2);
    assert_eq!(summary.total_duplicates, 4);
    assert_eq!(summary.total_crawled, 6);
    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(summary.books.len(), 6);
}

#[tokio::test]
async fn test_unlimited_run_follows_pagination_to_last_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(
        &mock_server,
        "rust",
        listing_html(&base_url, &[1, 2, 3, 4], Some("/list/2")),
    )
    .await;
    mount_page(
        &mock_server,
        "/list/2",
        listing_html(&base_url, &[5, 6, 7, 8], Some("/list/3")),
    )
    .await;
    mount_page(&mock_server, "/list/3", listing_html(&base_url, &[9, 10], None)).await;
    mount_unique_details(&mock_server, &(1..=10).collect::<Vec<_>>()).await;

    let supervisor = Supervisor::new(create_test_config(&base_url), memory_gate());
    let summary = supervisor.run(request("rust", 0, 3)).await.unwrap();

    assert_eq!(summary.total_saved, 10);
    assert_eq!(summary.total_crawled, 10);
    assert_eq!(summary.total_skipped, 0);
    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
    // Each listing mock expects exactly one hit; verified when the server drops
}

#[tokio::test]
async fn test_failing_store_saves_nothing() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &[1, 2, 3, 4], None)).await;
    mount_unique_details(&mock_server, &[1, 2, 3, 4]).await;

    let store = Arc::new(MemoryBookStore::new());
    store.close().unwrap();
    let supervisor = Supervisor::new(create_test_config(&base_url), DedupGate::new(store));
    let summary = supervisor.run(request("rust", 3, 2)).await.unwrap();

    assert_eq!(summary.total_saved, 0);
    assert_eq!(summary.total_crawled, 4);
    assert_eq!(summary.run_id, None, "run history could not be recorded");
    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(summary.books.len(), 4, "extracted records are still reported");
}

#[tokio::test]
async fn test_unavailable_store_still_completes() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &[1, 2], None)).await;
    mount_unique_details(&mock_server, &[1, 2]).await;

    let supervisor = Supervisor::new(create_test_config(&base_url), DedupGate::unavailable());
    let summary = supervisor.run(request("rust", 5, 1)).await.unwrap();

    assert_eq!(summary.total_saved, 0);
    assert_eq!(summary.total_crawled, 2);
    assert_eq!(summary.books.len(), 2);
}

#[tokio::test]
async fn test_detail_fetch_failure_is_counted() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &[1, 2, 3], None)).await;
    mount_unique_details(&mock_server, &[1, 3]).await;
    Mock::given(method("GET"))
        .and(path("/book/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let supervisor = Supervisor::new(create_test_config(&base_url), memory_gate());
    let summary = supervisor.run(request("rust", 10, 1)).await.unwrap();

    assert_eq!(summary.total_saved, 2);
    assert_eq!(summary.total_crawled, 2);
    assert_eq!(summary.total_failed, 1);
}

#[tokio::test]
async fn test_crawl_limit_caps_unlimited_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let ids: Vec<u32> = (1..=6).collect();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &ids, None)).await;
    mount_unique_details(&mock_server, &ids).await;

    let mut config = create_test_config(&base_url);
    config.crawler.max_crawl_limit = 3;
    let supervisor = Supervisor::new(config, memory_gate());
    let summary = supervisor.run(request("rust", 0, 1)).await.unwrap();

    assert_eq!(summary.total_crawled, 3);
    assert_eq!(summary.total_saved, 3);
    assert_eq!(summary.total_skipped, 3);
    assert_eq!(summary.stop_reason, Some(StopReason::CrawlLimit));
}

#[tokio::test]
async fn test_deadline_returns_partial_results() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &[1, 2, 3, 4], None)).await;
    mount_slow_details(&mock_server, &[1, 2, 3, 4], Duration::from_secs(2)).await;

    let mut config = create_test_config(&base_url);
    config.crawler.deadline_secs = 1;
    config.crawler.grace_period_secs = 5;
    let supervisor = Supervisor::new(config, memory_gate());
    let summary = supervisor.run(request("rust", 10, 2)).await.unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::Deadline));
    // In-flight fetches finish during the grace period; queued ones are skipped
    assert!(summary.total_saved <= 2);
    assert_eq!(summary.total_saved + summary.total_skipped, 4);
    assert_eq!(summary.books.len() as u64, summary.total_crawled);
}

#[tokio::test]
async fn test_grace_period_expiry_aborts_workers() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &[1, 2], None)).await;
    mount_slow_details(&mock_server, &[1, 2], Duration::from_secs(3)).await;

    let mut config = create_test_config(&base_url);
    config.crawler.deadline_secs = 1;
    config.crawler.grace_period_secs = 1;
    let store = Arc::new(MemoryBookStore::new());
    let supervisor = Supervisor::new(config, DedupGate::new(store.clone()));
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        supervisor.run(request("rust", 10, 2)),
    )
    .await
    .expect("supervisor should not wait for stuck workers")
    .unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::Deadline));
    assert_eq!(summary.total_saved, 0);
    assert_eq!(summary.total_crawled, 0);
    assert_eq!(summary.total_skipped, 2, "aborted in-flight pages are skipped");
    assert!(summary.books.is_empty());
    assert!(summary.elapsed_ms < 5000);

    // The slow responses arrive after the run returned; nothing may be saved
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(store.count_books().unwrap(), 0);
}

#[tokio::test]
async fn test_dead_listing_source_ends_with_empty_run() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let supervisor = Supervisor::new(create_test_config(&mock_server.uri()), memory_gate());
    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        supervisor.run(request("rust", 5, 3)),
    )
    .await
    .expect("run should not hang")
    .unwrap();

    assert_eq!(summary.total_saved, 0);
    assert_eq!(summary.total_crawled, 0);
    assert_eq!(summary.total_failed, 1);
    assert!(summary.books.is_empty());
    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
}

#[tokio::test]
async fn test_empty_listing_page_ends_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(&mock_server, "nothing", listing_html(&base_url, &[], None)).await;

    let supervisor = Supervisor::new(create_test_config(&base_url), memory_gate());
    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        supervisor.run(request("nothing", 5, 2)),
    )
    .await
    .expect("run should not hang")
    .unwrap();

    assert_eq!(summary.total_saved, 0);
    assert_eq!(summary.total_crawled, 0);
    assert_eq!(summary.total_failed, 0);
    assert_eq!(summary.total_skipped, 0);
    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
}

#[tokio::test]
async fn test_caller_cancellation_stops_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_first_page(&mock_server, "rust", listing_html(&base_url, &[1, 2, 3], None)).await;
    mount_slow_details(&mock_server, &[1, 2, 3], Duration::from_secs(2)).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let supervisor = Supervisor::new(create_test_config(&base_url), memory_gate());
    let summary = supervisor
        .run_with_cancellation(request("rust", 10, 1), cancel)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::Cancelled));
    assert!(summary.total_saved <= 1);
    assert!(summary.total_skipped >= 2);
}

#[tokio::test]
async fn test_sqlite_store_dedupes_across_runs() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("key", "rust"))
        .respond_with(html(listing_html(&base_url, &[1, 2, 3], None)))
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_unique_details(&mock_server, &[1, 2, 3]).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("books.db");
    let mut config = create_test_config(&base_url);
    config.store = StoreConfig {
        database_path: db_path.to_string_lossy().to_string(),
        enabled: true,
    };

    let first = crawl(config.clone(), request("rust", 10, 2), "hash-1", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.total_saved, 3);
    assert!(first.run_id.is_some());

    let second = crawl(config, request("rust", 10, 2), "hash-1", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.total_saved, 0);
    assert_eq!(second.total_duplicates, 3);

    let store = open_storage(&db_path).unwrap();
    assert_eq!(store.count_books().unwrap(), 3);
    assert_eq!(store.keyword_counts().unwrap(), vec![("rust".to_string(), 3)]);

    let latest = store.latest_run().unwrap().unwrap();
    assert_eq!(Some(latest.id), second.run_id);
    assert_eq!(latest.config_hash, "hash-1");
    assert_eq!(latest.total_duplicates, 3);
    assert_eq!(latest.stop_reason.as_deref(), Some("frontier_exhausted"));
    assert!(latest.finished_at.is_some());
}

#[test]
fn test_open_gate_falls_back_to_memory_when_disabled() {
    let gate = open_gate(&StoreConfig {
        database_path: "/nonexistent/dir/books.db".to_string(),
        enabled: false,
    });
    assert!(gate.is_available());
}

#[tokio::test]
async fn test_invalid_requests_rejected_before_fetching() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let supervisor = Supervisor::new(create_test_config(&mock_server.uri()), memory_gate());

    let result = supervisor.run(request("   ", 5, 1)).await;
    assert!(matches!(result, Err(HoundError::InvalidRequest(_))));

    let result = supervisor.run(request("rust", 100_000, 1)).await;
    assert!(matches!(result, Err(HoundError::InvalidRequest(_))));

    let result = supervisor.run(request("rust", 5, 0)).await;
    assert!(matches!(result, Err(HoundError::InvalidRequest(_))));
}
